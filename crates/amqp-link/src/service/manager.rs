//! # Connection Manager
//!
//! Owns exactly one broker connection and one channel behind a single async
//! mutex. Every read or write of the connection, channel, state and shutdown
//! flag happens while holding that lock; the close-watcher task and callers
//! of `ensure_live`/`shutdown` synchronise only through it.
//!
//! ## Generations
//!
//! Each successful dial increments `generation`. A close-watcher or retry
//! sequence remembers the generation it was started for and stops as soon
//! as the link has moved on, so two recoveries never race to open a second
//! connection.
//!
//! ## Recovery
//!
//! ```text
//! watcher ──Abnormal──► Reconnecting ──sleep(delay_for(i))──► dial
//!                            ▲                                 │
//!                            └────────fail (i < max)───────────┤
//!                                                              ├─ok──► Connected + new watcher
//!                                                              └─fail (i = max)──► Disconnected
//! ```

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::domain::{ConnectionState, ConnectionStatus, LinkConfig};
use crate::error::LinkError;
use crate::metrics::LinkMetrics;
use crate::ports::{
    BrokerChannel, BrokerConnection, BrokerConnector, ChannelOf, CloseNotifier, CloseSignal,
};

/// Mutable link state. Only reachable through the manager's lock.
pub(crate) struct Link<C: BrokerConnector> {
    connection: Option<C::Connection>,
    channel: Option<ChannelOf<C>>,
    state: ConnectionState,
    generation: u64,
    shutdown_requested: bool,
    last_failure: Option<String>,
}

impl<C: BrokerConnector> Link<C> {
    fn new() -> Self {
        Self {
            connection: None,
            channel: None,
            state: ConnectionState::Disconnected,
            generation: 0,
            shutdown_requested: false,
            last_failure: None,
        }
    }

    /// Connection and channel both present and open.
    fn is_live(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_open())
            && self.channel.as_ref().is_some_and(|c| c.is_open())
    }

    pub(crate) fn connection(&self) -> Option<&C::Connection> {
        self.connection.as_ref()
    }

    /// The open channel, or `NotConnected`.
    pub(crate) fn channel(&self) -> Result<&ChannelOf<C>, LinkError> {
        self.channel.as_ref().ok_or(LinkError::NotConnected)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }
}

/// Broker connection manager.
///
/// Shared as `Arc<ConnectionManager<C>>` by the publisher, the health probe
/// and the background close-watcher.
pub struct ConnectionManager<C: BrokerConnector> {
    config: LinkConfig,
    connector: C,
    link: Mutex<Link<C>>,
    metrics: LinkMetrics,
}

impl<C: BrokerConnector> ConnectionManager<C> {
    /// Create a manager in `Disconnected` state without dialing.
    ///
    /// The first `ensure_live` call opens the connection.
    pub fn new(config: LinkConfig, connector: C) -> Arc<Self> {
        Arc::new(Self {
            config,
            connector,
            link: Mutex::new(Link::new()),
            metrics: LinkMetrics::new(),
        })
    }

    /// Create a manager and open the connection immediately.
    pub async fn connect(config: LinkConfig, connector: C) -> Result<Arc<Self>, LinkError> {
        let manager = Self::new(config, connector);
        manager.ensure_live().await?;
        Ok(manager)
    }

    /// Make sure a live connection and channel exist.
    ///
    /// Returns immediately without I/O when already connected. Otherwise
    /// performs one synchronous dial and returns its outcome.
    pub async fn ensure_live(self: &Arc<Self>) -> Result<(), LinkError> {
        self.lock_live().await.map(|_| ())
    }

    /// Lock the link, dialing first if it is not live.
    ///
    /// The returned guard keeps the link exclusive for the caller's broker
    /// operations, so nothing can tear it down in between.
    pub(crate) async fn lock_live(self: &Arc<Self>) -> Result<MutexGuard<'_, Link<C>>, LinkError> {
        let mut link = self.link.lock().await;

        if link.shutdown_requested {
            return Err(LinkError::Closed);
        }
        if link.state == ConnectionState::Connected && link.is_live() {
            return Ok(link);
        }

        debug!(state = %link.state, "Broker link not live, dialing");
        let notifier = self.redial(&mut link).await?;
        self.spawn_watcher(link.generation, notifier);
        Ok(link)
    }

    /// Lock the link without dialing.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Link<C>> {
        self.link.lock().await
    }

    /// Close the channel and connection and enter `Closed` for good.
    ///
    /// Both closes are attempted even if one fails; failures are joined
    /// into one error. Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<(), LinkError> {
        let mut link = self.link.lock().await;
        if link.shutdown_requested {
            return Ok(());
        }

        link.shutdown_requested = true;
        link.state = ConnectionState::Closed;

        let mut failures = Vec::new();
        if let Some(channel) = link.channel.take() {
            if let Err(e) = channel.close().await {
                failures.push(format!("failed to close channel: {e}"));
            }
        }
        if let Some(connection) = link.connection.take() {
            if let Err(e) = connection.close().await {
                failures.push(format!("failed to close connection: {e}"));
            }
        }

        if failures.is_empty() {
            info!(generation = link.generation, "Broker link shut down");
            Ok(())
        } else {
            warn!(errors = ?failures, "Broker link shut down with errors");
            Err(LinkError::Shutdown(failures.join("; ")))
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        self.link.lock().await.state
    }

    /// State, generation and last failure.
    pub async fn status(&self) -> ConnectionStatus {
        let link = self.link.lock().await;
        ConnectionStatus {
            state: link.state,
            generation: link.generation,
            last_failure: link.last_failure.clone(),
        }
    }

    pub fn metrics(&self) -> &LinkMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Open a connection, then one channel on it.
    ///
    /// A channel failure closes the fresh connection before returning.
    async fn dial(&self) -> Result<(C::Connection, ChannelOf<C>), LinkError> {
        self.metrics.record_dial();

        let connection = self
            .connector
            .connect(self.config.url())
            .await
            .map_err(LinkError::Connect)?;

        match connection.open_channel().await {
            Ok(channel) => Ok((connection, channel)),
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    debug!(error = %close_err, "Failed to close connection after channel error");
                }
                Err(LinkError::OpenChannel(e))
            }
        }
    }

    /// Tear down whatever is left of the current link and dial a new one.
    ///
    /// Caller holds the lock. On success the link is `Connected` under a new
    /// generation; the returned notifier belongs to the new connection.
    async fn redial(&self, link: &mut Link<C>) -> Result<CloseNotifier, LinkError> {
        if let Some(channel) = link.channel.take() {
            if channel.is_open() {
                if let Err(e) = channel.close().await {
                    debug!(error = %e, "Failed to close stale channel");
                }
            }
        }
        if let Some(connection) = link.connection.take() {
            if connection.is_open() {
                if let Err(e) = connection.close().await {
                    debug!(error = %e, "Failed to close stale connection");
                }
            }
        }

        match self.dial().await {
            Ok((connection, channel)) => {
                let notifier = connection.close_notifier();
                link.connection = Some(connection);
                link.channel = Some(channel);
                link.generation += 1;
                link.state = ConnectionState::Connected;
                link.last_failure = None;
                info!(
                    generation = link.generation,
                    broker = %self.config.redacted_url(),
                    "Broker link established"
                );
                Ok(notifier)
            }
            Err(e) => {
                link.last_failure = Some(e.to_string());
                if link.state != ConnectionState::Reconnecting {
                    link.state = ConnectionState::Disconnected;
                }
                Err(e)
            }
        }
    }

    /// Start the close-watcher for `generation`.
    ///
    /// A plain function rather than `async` so the watcher future does not
    /// contain its own type.
    fn spawn_watcher(self: &Arc<Self>, generation: u64, notifier: CloseNotifier) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.watch_connection(generation, notifier).await;
        });
    }

    /// Wait for the connection of `generation` to close and recover from an
    /// abnormal close.
    async fn watch_connection(self: Arc<Self>, generation: u64, mut notifier: CloseNotifier) {
        // A dropped sender means the connection is gone along with its owner.
        let signal = notifier
            .wait_for(|signal| !signal.is_open())
            .await
            .map(|signal| signal.clone())
            .unwrap_or(CloseSignal::Graceful);

        {
            let mut link = self.link.lock().await;
            if link.shutdown_requested || link.generation != generation {
                return;
            }
            match signal {
                CloseSignal::Abnormal(reason) => {
                    warn!(generation, reason = %reason, "Broker connection lost, reconnecting");
                    link.state = ConnectionState::Reconnecting;
                    link.last_failure = Some(reason);
                }
                CloseSignal::Graceful | CloseSignal::Open => {
                    // Not recovered in the background; the next caller dials.
                    info!(generation, "Broker closed the connection gracefully");
                    link.state = ConnectionState::Disconnected;
                    return;
                }
            }
        }

        match self.reconnect_with_backoff(generation).await {
            Ok(()) => {}
            Err(LinkError::ClosedDuringReconnect) => {
                info!(generation, "Reconnection aborted by shutdown");
            }
            Err(e) => {
                error!(generation, error = %e, "Broker reconnection abandoned");
            }
        }
    }

    /// Backoff retry sequence for a lost connection of `generation`.
    ///
    /// Returns `Ok` once the link is live again, whether this sequence or a
    /// concurrent `ensure_live` restored it.
    async fn reconnect_with_backoff(self: &Arc<Self>, generation: u64) -> Result<(), LinkError> {
        let policy = self.config.backoff();
        let mut last_error = String::new();

        for attempt in 0..policy.max_attempts {
            let delay = policy.delay_for(attempt);

            {
                let link = self.link.lock().await;
                if link.shutdown_requested {
                    return Err(LinkError::ClosedDuringReconnect);
                }
                if link.generation != generation {
                    debug!(generation, "Link recovered elsewhere, stopping retries");
                    return Ok(());
                }
            }

            debug!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Waiting before reconnect attempt"
            );
            tokio::time::sleep(delay).await;

            let mut link = self.link.lock().await;
            if link.shutdown_requested {
                return Err(LinkError::ClosedDuringReconnect);
            }
            if link.generation != generation {
                debug!(generation, "Link recovered elsewhere, stopping retries");
                return Ok(());
            }

            self.metrics.record_reconnect_attempt();
            match self.redial(&mut link).await {
                Ok(notifier) => {
                    self.metrics.record_reconnect_succeeded();
                    info!(
                        attempt = attempt + 1,
                        generation = link.generation,
                        "Broker link restored"
                    );
                    self.spawn_watcher(link.generation, notifier);
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Reconnect attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        let exhausted = LinkError::ReconnectExhausted {
            attempts: policy.max_attempts,
            last_error,
        };

        let mut link = self.link.lock().await;
        if !link.shutdown_requested && link.generation == generation {
            link.state = ConnectionState::Disconnected;
            link.last_failure = Some(exhausted.to_string());
        }
        self.metrics.record_reconnect_exhausted();

        Err(exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryBroker;
    use crate::domain::BackoffPolicy;
    use std::time::Duration;

    fn config() -> LinkConfig {
        LinkConfig::new("amqp://localhost").unwrap()
    }

    #[tokio::test]
    async fn test_new_starts_disconnected() {
        let manager = ConnectionManager::new(config(), InMemoryBroker::new());
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert_eq!(manager.status().await.generation, 0);
    }

    #[tokio::test]
    async fn test_connect_opens_link() {
        let broker = InMemoryBroker::new();
        let manager = ConnectionManager::connect(config(), broker.clone()).await.unwrap();

        assert_eq!(manager.state().await, ConnectionState::Connected);
        assert_eq!(broker.dial_count(), 1);
        assert_eq!(broker.open_connections(), 1);
    }

    #[tokio::test]
    async fn test_ensure_live_is_cheap_when_connected() {
        let broker = InMemoryBroker::new();
        let manager = ConnectionManager::connect(config(), broker.clone()).await.unwrap();

        manager.ensure_live().await.unwrap();
        manager.ensure_live().await.unwrap();

        assert_eq!(broker.dial_count(), 1);
        assert_eq!(manager.status().await.generation, 1);
    }

    #[tokio::test]
    async fn test_channel_failure_closes_connection() {
        let broker = InMemoryBroker::new();
        broker.fail_channel_open(true);
        let manager = ConnectionManager::new(config(), broker.clone());

        let err = manager.ensure_live().await.unwrap_err();

        assert!(matches!(err, LinkError::OpenChannel(_)));
        assert_eq!(broker.open_connections(), 0);
        assert_eq!(manager.state().await, ConnectionState::Disconnected);
        assert!(manager.status().await.last_failure.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_broker() {
        let broker = InMemoryBroker::new();
        broker.set_reachable(false);
        let manager = ConnectionManager::new(config(), broker.clone());

        let err = manager.ensure_live().await.unwrap_err();
        assert!(matches!(err, LinkError::Connect(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_ensure_live_redials_dead_link_once() {
        let broker = InMemoryBroker::new();
        let backoff = BackoffPolicy {
            max_attempts: 5,
            initial: Duration::from_secs(3600),
            max: Duration::from_secs(3600),
        };
        let manager =
            ConnectionManager::connect(config().with_backoff(backoff), broker.clone()).await.unwrap();

        broker.drop_connections("connection reset by peer");
        manager.ensure_live().await.unwrap();

        assert_eq!(broker.dial_count(), 2);
        assert_eq!(broker.open_connections(), 1);
        assert_eq!(manager.state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_shutdown_is_terminal_and_idempotent() {
        let broker = InMemoryBroker::new();
        let manager = ConnectionManager::connect(config(), broker.clone()).await.unwrap();

        manager.shutdown().await.unwrap();
        manager.shutdown().await.unwrap();

        assert_eq!(manager.state().await, ConnectionState::Closed);
        assert_eq!(broker.open_connections(), 0);
        assert!(matches!(manager.ensure_live().await, Err(LinkError::Closed)));
        assert_eq!(broker.dial_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_joins_close_errors() {
        let broker = InMemoryBroker::new();
        let manager = ConnectionManager::connect(config(), broker.clone()).await.unwrap();
        broker.fail_close(true);

        let err = manager.shutdown().await.unwrap_err();
        let message = err.to_string();

        assert!(message.contains("failed to close channel"));
        assert!(message.contains("failed to close connection"));
        assert_eq!(manager.state().await, ConnectionState::Closed);
    }
}
