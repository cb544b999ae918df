//! # AMQP Link - Resilient Broker Publishing
//!
//! Keeps one AMQP connection and one publish channel alive for the relay,
//! publishes certificate events over it and answers readiness probes.
//!
//! ## Architecture
//!
//! ```text
//!  HTTP / watcher
//!        │ EventPublisher / HealthProbe (inbound ports)
//!        ▼
//! ┌──────────────────────────────┐
//! │ AmqpPublisher  HealthProbe   │
//! │        │            │        │
//! │        ▼            ▼        │
//! │     ConnectionManager ◄──────┼── close-watcher task (one per generation)
//! └──────────────┬───────────────┘
//!                │ BrokerConnector (outbound port)
//!                ▼
//!      LapinConnector | InMemoryBroker
//! ```
//!
//! ## Guarantees
//!
//! - At most one live connection per manager
//! - Automatic recovery after an abnormal close, bounded by [`BackoffPolicy`]
//! - `shutdown` is terminal and aborts any recovery in progress
//! - A publish is one connect-or-verify, declare and send cycle; it is not
//!   retried

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryBroker, LapinConnector, PublishedMessage};
pub use domain::{BackoffPolicy, ConnectionState, ConnectionStatus, LinkConfig};
pub use error::{HealthError, LinkError, PublishError};
pub use metrics::{LinkMetrics, LinkMetricsSnapshot};
pub use ports::{EventPublisher, HealthProbe};
pub use service::{AmqpPublisher, BrokerHealthProbe, ConnectionManager};
