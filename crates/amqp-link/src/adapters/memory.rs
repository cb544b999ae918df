//! # In-Memory Broker
//!
//! A process-local stand-in for an AMQP broker. Records declarations and
//! published messages and lets callers inject the failures a real broker
//! produces: refused dials, channel errors, dropped connections, rejected
//! declarations.
//!
//! Suitable for tests and local runs; it persists nothing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::ports::{
    BrokerChannel, BrokerConnection, BrokerConnector, CloseNotifier, CloseSignal, ExchangeSpec,
    PublishProperties, TransportError,
};

/// A message accepted by the in-memory broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub properties: PublishProperties,
}

#[derive(Default)]
struct BrokerState {
    unreachable: bool,
    failing_dials: u32,
    fail_channel_open: bool,
    fail_close: bool,
    reject_probes: bool,
    dial_count: u32,
    next_connection_id: u64,
    connections: HashMap<u64, Arc<watch::Sender<CloseSignal>>>,
    exchanges: HashMap<String, ExchangeSpec>,
    published: Vec<PublishedMessage>,
    probe_queues: u64,
}

/// In-memory broker. Cloning shares the same broker.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every dial while `false`.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unreachable = !reachable;
    }

    /// Refuse the next `count` dials.
    pub fn fail_next_dials(&self, count: u32) {
        self.state.lock().failing_dials = count;
    }

    /// Refuse channel opens while `true`.
    pub fn fail_channel_open(&self, fail: bool) {
        self.state.lock().fail_channel_open = fail;
    }

    /// Report an error from every close while `true`. The close still happens.
    pub fn fail_close(&self, fail: bool) {
        self.state.lock().fail_close = fail;
    }

    /// Reject transient queue declarations while `true`.
    pub fn reject_probes(&self, reject: bool) {
        self.state.lock().reject_probes = reject;
    }

    /// Close every open connection abnormally, as a broker restart would.
    pub fn drop_connections(&self, reason: &str) {
        let dropped: Vec<_> = self.state.lock().connections.drain().collect();
        for (id, signal) in dropped {
            debug!(connection = id, reason, "Dropping in-memory connection");
            signal.send_replace(CloseSignal::Abnormal(reason.to_string()));
        }
    }

    /// Close every open connection gracefully, as a broker-initiated clean
    /// close would.
    pub fn close_connections(&self) {
        let closed: Vec<_> = self.state.lock().connections.drain().collect();
        for (id, signal) in closed {
            debug!(connection = id, "Closing in-memory connection");
            signal.send_replace(CloseSignal::Graceful);
        }
    }

    /// Total dial attempts, including refused ones.
    pub fn dial_count(&self) -> u32 {
        self.state.lock().dial_count
    }

    /// Connections currently open.
    pub fn open_connections(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Declared exchange by name.
    pub fn exchange(&self, name: &str) -> Option<ExchangeSpec> {
        self.state.lock().exchanges.get(name).cloned()
    }

    /// Messages in the order they were accepted.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().published.clone()
    }

    /// Transient queues declared so far.
    pub fn probe_queue_count(&self) -> u64 {
        self.state.lock().probe_queues
    }

    fn close_connection(&self, id: u64) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(signal) = state.connections.remove(&id) {
            signal.send_replace(CloseSignal::Graceful);
        }
        if state.fail_close {
            return Err(TransportError::new("connection.close", "broker did not acknowledge close"));
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerConnector for InMemoryBroker {
    type Connection = MemoryConnection;

    async fn connect(&self, _url: &str) -> Result<MemoryConnection, TransportError> {
        let mut state = self.state.lock();
        state.dial_count += 1;

        if state.unreachable {
            return Err(TransportError::new("connect", "connection refused"));
        }
        if state.failing_dials > 0 {
            state.failing_dials -= 1;
            return Err(TransportError::new("connect", "connection refused"));
        }

        state.next_connection_id += 1;
        let id = state.next_connection_id;
        let (signal, _) = watch::channel(CloseSignal::Open);
        let signal = Arc::new(signal);
        state.connections.insert(id, Arc::clone(&signal));

        Ok(MemoryConnection {
            id,
            broker: self.clone(),
            signal,
        })
    }
}

/// Connection to an [`InMemoryBroker`].
pub struct MemoryConnection {
    id: u64,
    broker: InMemoryBroker,
    signal: Arc<watch::Sender<CloseSignal>>,
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    type Channel = MemoryChannel;

    async fn open_channel(&self) -> Result<MemoryChannel, TransportError> {
        if !self.is_open() {
            return Err(TransportError::new("channel.open", "connection is closed"));
        }
        if self.broker.state.lock().fail_channel_open {
            return Err(TransportError::new("channel.open", "channel limit reached"));
        }

        Ok(MemoryChannel {
            broker: self.broker.clone(),
            connection: Arc::clone(&self.signal),
            closed: AtomicBool::new(false),
        })
    }

    fn is_open(&self) -> bool {
        self.signal.borrow().is_open()
    }

    fn close_notifier(&self) -> CloseNotifier {
        self.signal.subscribe()
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.broker.close_connection(self.id)
    }
}

/// Channel on a [`MemoryConnection`].
pub struct MemoryChannel {
    broker: InMemoryBroker,
    connection: Arc<watch::Sender<CloseSignal>>,
    closed: AtomicBool,
}

impl MemoryChannel {
    fn check_open(&self, operation: &'static str) -> Result<(), TransportError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(TransportError::new(operation, "channel is closed"))
        }
    }
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.connection.borrow().is_open()
    }

    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), TransportError> {
        self.check_open("exchange.declare")?;

        let mut state = self.broker.state.lock();
        match state.exchanges.get(&spec.name) {
            Some(existing) if existing != spec => Err(TransportError::new(
                "exchange.declare",
                format!(
                    "PRECONDITION_FAILED - inequivalent arg for exchange '{}'",
                    spec.name
                ),
            )),
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(spec.name.clone(), spec.clone());
                Ok(())
            }
        }
    }

    async fn declare_transient_queue(&self) -> Result<String, TransportError> {
        self.check_open("queue.declare")?;

        let mut state = self.broker.state.lock();
        if state.reject_probes {
            return Err(TransportError::new("queue.declare", "ACCESS_REFUSED"));
        }
        state.probe_queues += 1;
        Ok(format!("amq.gen-{}", state.probe_queues))
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: &PublishProperties,
    ) -> Result<(), TransportError> {
        self.check_open("basic.publish")?;

        let mut state = self.broker.state.lock();
        if !state.exchanges.contains_key(exchange) {
            return Err(TransportError::new(
                "basic.publish",
                format!("NOT_FOUND - no exchange '{exchange}'"),
            ));
        }
        state.published.push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.to_vec(),
            properties: properties.clone(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.broker.state.lock().fail_close {
            return Err(TransportError::new("channel.close", "broker did not acknowledge close"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ExchangeKind;

    #[tokio::test]
    async fn test_connect_and_publish() {
        let broker = InMemoryBroker::new();
        let connection = broker.connect("amqp://localhost").await.unwrap();
        let channel = connection.open_channel().await.unwrap();

        channel
            .declare_exchange(&ExchangeSpec::durable_topic("certs"))
            .await
            .unwrap();
        channel
            .publish("certs", "renewed", b"{}", &PublishProperties::persistent_json(1))
            .await
            .unwrap();

        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].routing_key, "renewed");
        assert!(published[0].properties.persistent);
    }

    #[tokio::test]
    async fn test_conflicting_declaration() {
        let broker = InMemoryBroker::new();
        let connection = broker.connect("amqp://localhost").await.unwrap();
        let channel = connection.open_channel().await.unwrap();

        channel
            .declare_exchange(&ExchangeSpec::durable_topic("certs"))
            .await
            .unwrap();

        let mut fanout = ExchangeSpec::durable_topic("certs");
        fanout.kind = ExchangeKind::Fanout;
        let err = channel.declare_exchange(&fanout).await.unwrap_err();
        assert!(err.message.contains("PRECONDITION_FAILED"));
    }

    #[tokio::test]
    async fn test_drop_connections_signals_abnormal() {
        let broker = InMemoryBroker::new();
        let connection = broker.connect("amqp://localhost").await.unwrap();
        let channel = connection.open_channel().await.unwrap();
        let notifier = connection.close_notifier();

        broker.drop_connections("broker restart");

        assert!(!connection.is_open());
        assert!(!channel.is_open());
        assert_eq!(
            *notifier.borrow(),
            CloseSignal::Abnormal("broker restart".to_string())
        );
        assert_eq!(broker.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_close_signals_graceful() {
        let broker = InMemoryBroker::new();
        let connection = broker.connect("amqp://localhost").await.unwrap();
        let notifier = connection.close_notifier();

        connection.close().await.unwrap();

        assert_eq!(*notifier.borrow(), CloseSignal::Graceful);
    }

    #[tokio::test]
    async fn test_unreachable_and_failing_dials() {
        let broker = InMemoryBroker::new();
        broker.set_reachable(false);
        assert!(broker.connect("amqp://localhost").await.is_err());

        broker.set_reachable(true);
        broker.fail_next_dials(1);
        assert!(broker.connect("amqp://localhost").await.is_err());
        assert!(broker.connect("amqp://localhost").await.is_ok());
        assert_eq!(broker.dial_count(), 3);
    }
}
