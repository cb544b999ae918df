//! Outbound Ports (Driven Ports)
//!
//! The slice of the AMQP 0-9-1 surface the link needs: dial, one channel,
//! exchange declare, transient queue declare, publish, close. Adapters in
//! `crate::adapters` implement these for `lapin` and for an in-memory broker.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

/// Failure reported by a transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation}: {message}")]
pub struct TransportError {
    /// Broker operation that failed (e.g. `connect`, `exchange.declare`).
    pub operation: &'static str,
    pub message: String,
}

impl TransportError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Close notification published by a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseSignal {
    /// Connection is still open.
    Open,
    /// Closed on purpose by the owner. Already handled.
    Graceful,
    /// Closed by the broker or the network.
    Abnormal(String),
}

impl CloseSignal {
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, CloseSignal::Open)
    }
}

/// Receiver side of a connection's close notification.
pub type CloseNotifier = watch::Receiver<CloseSignal>;

/// AMQP exchange types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    Direct,
    Fanout,
    Topic,
}

/// Exchange declaration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
}

impl ExchangeSpec {
    /// Durable, non-auto-deleted, non-internal topic exchange.
    #[must_use]
    pub fn durable_topic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ExchangeKind::Topic,
            durable: true,
            auto_delete: false,
            internal: false,
        }
    }
}

/// Properties attached to a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishProperties {
    pub content_type: String,
    /// Unix seconds.
    pub timestamp: u64,
    /// Ask the broker to persist the message (delivery mode 2).
    pub persistent: bool,
}

impl PublishProperties {
    /// Persistent `application/json` message stamped with `timestamp`.
    #[must_use]
    pub fn persistent_json(timestamp: u64) -> Self {
        Self {
            content_type: "application/json".to_string(),
            timestamp,
            persistent: true,
        }
    }
}

/// Opens transport connections (Driven Port).
#[async_trait]
pub trait BrokerConnector: Send + Sync + 'static {
    type Connection: BrokerConnection;

    /// Open a transport connection to `url`.
    async fn connect(&self, url: &str) -> Result<Self::Connection, TransportError>;
}

/// A live transport connection (Driven Port).
#[async_trait]
pub trait BrokerConnection: Send + Sync + 'static {
    type Channel: BrokerChannel;

    /// Open a channel on this connection.
    async fn open_channel(&self) -> Result<Self::Channel, TransportError>;

    /// Whether the transport still reports itself open.
    fn is_open(&self) -> bool;

    /// Subscribe to the close notification of this connection.
    ///
    /// The current value is observable immediately, so a close that happened
    /// before subscribing is not missed.
    fn close_notifier(&self) -> CloseNotifier;

    /// Close the connection. Publishes [`CloseSignal::Graceful`].
    async fn close(&self) -> Result<(), TransportError>;
}

/// A channel on a connection (Driven Port).
#[async_trait]
pub trait BrokerChannel: Send + Sync + 'static {
    fn is_open(&self) -> bool;

    /// Declare an exchange. Idempotent for identical parameters; a conflicting
    /// prior declaration is a broker error.
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), TransportError>;

    /// Declare a server-named, exclusive, auto-deleting, non-durable queue
    /// and return its name. Requires a broker round-trip.
    async fn declare_transient_queue(&self) -> Result<String, TransportError>;

    /// Send a message. Returns once the transport accepted the frame; no
    /// publisher confirm is awaited.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: &PublishProperties,
    ) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Channel type of a connector's connections.
pub type ChannelOf<C> = <<C as BrokerConnector>::Connection as BrokerConnection>::Channel;
