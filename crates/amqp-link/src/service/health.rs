//! Readiness probe over the broker link.
//!
//! Reads the link under its lock and makes one broker round-trip. Never
//! dials and never changes link state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::ConnectionState;
use crate::error::HealthError;
use crate::ports::{BrokerChannel, BrokerConnection, BrokerConnector, HealthProbe};
use crate::service::manager::ConnectionManager;

/// Health probe for a [`ConnectionManager`].
pub struct BrokerHealthProbe<C: BrokerConnector> {
    manager: Arc<ConnectionManager<C>>,
}

impl<C: BrokerConnector> BrokerHealthProbe<C> {
    pub fn new(manager: Arc<ConnectionManager<C>>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<C: BrokerConnector> HealthProbe for BrokerHealthProbe<C> {
    async fn health_check(&self) -> Result<(), HealthError> {
        let link = self.manager.lock().await;

        if link.state() == ConnectionState::Closed {
            return Err(HealthError::Closed);
        }
        if !link.connection().is_some_and(|c| c.is_open()) {
            return Err(HealthError::ConnectionClosed {
                last_failure: link.last_failure().map(str::to_string),
            });
        }
        let channel = link.channel().map_err(|_| HealthError::ChannelClosed)?;
        if !channel.is_open() {
            return Err(HealthError::ChannelClosed);
        }

        // The server names the queue; it goes away with the channel.
        let queue = channel
            .declare_transient_queue()
            .await
            .map_err(HealthError::Probe)?;
        debug!(queue = %queue, "Broker health probe succeeded");
        Ok(())
    }
}
