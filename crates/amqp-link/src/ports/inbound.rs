//! Inbound Ports (Driving Ports)
//!
//! What the watcher and HTTP layers call.

use async_trait::async_trait;
use cert_events::{CertificateEvent, RoutingTarget};
use tokio_util::sync::CancellationToken;

use crate::error::{HealthError, PublishError};

/// Publishes certificate events (Driving Port).
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `event` to `target`.
    ///
    /// Performs at most one connect-or-verify, declare and send cycle.
    /// `cancel` only aborts the send step; it never interrupts reconnection.
    async fn publish(
        &self,
        cancel: &CancellationToken,
        target: &RoutingTarget,
        event: &CertificateEvent,
    ) -> Result<(), PublishError>;
}

/// Readiness check of the broker link (Driving Port).
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Verify the link is live without reconnecting.
    async fn health_check(&self) -> Result<(), HealthError>;
}
