//! # AMQP Publisher
//!
//! One publish is one cycle under the link lock:
//!
//! ```text
//! lock_live ──► declare exchange ──► serialize ──► send ──► unlock
//! ```
//!
//! Holding the lock across the broker calls serialises publishes against
//! each other and against reconnection. Event volume is one message per
//! certificate renewal, so throughput is not a concern.

use std::sync::Arc;

use async_trait::async_trait;
use cert_events::{CertificateEvent, RoutingTarget};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::PublishError;
use crate::ports::{BrokerChannel, BrokerConnector, EventPublisher, ExchangeSpec, PublishProperties};
use crate::service::manager::ConnectionManager;

/// Publishes certificate events over a [`ConnectionManager`].
pub struct AmqpPublisher<C: BrokerConnector> {
    manager: Arc<ConnectionManager<C>>,
}

impl<C: BrokerConnector> AmqpPublisher<C> {
    pub fn new(manager: Arc<ConnectionManager<C>>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager<C>> {
        &self.manager
    }

    async fn publish_once(
        &self,
        cancel: &CancellationToken,
        target: &RoutingTarget,
        event: &CertificateEvent,
    ) -> Result<(), PublishError> {
        let link = self.manager.lock_live().await?;
        let channel = link.channel()?;

        channel
            .declare_exchange(&ExchangeSpec::durable_topic(&target.exchange))
            .await
            .map_err(|source| PublishError::DeclareExchange {
                exchange: target.exchange.clone(),
                source,
            })?;

        let payload = event.to_json()?;
        let properties = PublishProperties::persistent_json(
            u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default(),
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(PublishError::Cancelled),
            sent = channel.publish(&target.exchange, &target.routing_key, &payload, &properties) => {
                sent.map_err(PublishError::Send)
            }
        }
    }
}

#[async_trait]
impl<C: BrokerConnector> EventPublisher for AmqpPublisher<C> {
    async fn publish(
        &self,
        cancel: &CancellationToken,
        target: &RoutingTarget,
        event: &CertificateEvent,
    ) -> Result<(), PublishError> {
        let result = self.publish_once(cancel, target, event).await;
        self.manager.metrics().record_publish(result.is_ok());

        match &result {
            Ok(()) => debug!(
                certificate = %event.certificate,
                namespace = %event.namespace,
                target = %target,
                "Published certificate event"
            ),
            Err(e) => warn!(
                certificate = %event.certificate,
                namespace = %event.namespace,
                target = %target,
                error = %e,
                "Failed to publish certificate event"
            ),
        }

        result
    }
}
