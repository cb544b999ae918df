//! Ports Layer
//!
//! - Driving Ports (inbound) - API for the watcher and HTTP ingress
//! - Driven Ports (outbound) - the AMQP transport

pub mod inbound;
pub mod outbound;

pub use inbound::{EventPublisher, HealthProbe};
pub use outbound::{
    BrokerChannel, BrokerConnection, BrokerConnector, ChannelOf, CloseNotifier, CloseSignal,
    ExchangeKind, ExchangeSpec, PublishProperties, TransportError,
};
