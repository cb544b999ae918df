//! Error types for the broker link
//!
//! ## Taxonomy
//!
//! | Class | Variants | Retried internally |
//! |-------|----------|--------------------|
//! | Configuration | `LinkError::Config` | never |
//! | Connectivity | `LinkError::{Connect, OpenChannel, NotConnected, ReconnectExhausted}` | by the backoff sequence |
//! | Protocol | `PublishError::{DeclareExchange, Serialize, Send}` | never |
//! | Shutdown | `LinkError::{Closed, ClosedDuringReconnect, Shutdown}` | never |

use thiserror::Error;

use crate::ports::TransportError;

/// Errors from the connection manager.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("invalid broker configuration: {0}")]
    Config(String),

    #[error("failed to connect to broker: {0}")]
    Connect(#[source] TransportError),

    #[error("failed to open channel: {0}")]
    OpenChannel(#[source] TransportError),

    #[error("broker link has no open channel")]
    NotConnected,

    #[error("failed to reconnect after {attempts} attempts: {last_error}")]
    ReconnectExhausted { attempts: u32, last_error: String },

    #[error("client closed during reconnection")]
    ClosedDuringReconnect,

    #[error("broker link is closed")]
    Closed,

    #[error("failed to shut down broker link: {0}")]
    Shutdown(String),
}

impl LinkError {
    /// Whether the failure is transient connectivity that a later call may
    /// recover from.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LinkError::Connect(_)
                | LinkError::OpenChannel(_)
                | LinkError::NotConnected
                | LinkError::ReconnectExhausted { .. }
        )
    }
}

/// Errors from a single publish call.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to ensure connection: {0}")]
    Connection(#[from] LinkError),

    #[error("failed to declare exchange `{exchange}`: {source}")]
    DeclareExchange {
        exchange: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to marshal message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to publish message: {0}")]
    Send(#[source] TransportError),

    #[error("publish cancelled before the message was sent")]
    Cancelled,
}

/// Errors from the health probe.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("broker link is closed")]
    Closed,

    #[error("connection is closed{}", describe_failure(.last_failure))]
    ConnectionClosed { last_failure: Option<String> },

    #[error("channel is not open")]
    ChannelClosed,

    #[error("health check failed: {0}")]
    Probe(#[source] TransportError),
}

fn describe_failure(last_failure: &Option<String>) -> String {
    last_failure
        .as_deref()
        .map(|failure| format!(" (last failure: {failure})"))
        .unwrap_or_default()
}
