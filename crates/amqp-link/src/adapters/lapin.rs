//! # Lapin Adapter
//!
//! Production transport over the `lapin` AMQP 0-9-1 client.
//!
//! `lapin` reports abnormal closes through `Connection::on_error`; that
//! callback feeds the connection's [`CloseSignal`] watch. A close we initiate
//! publishes `Graceful` before the close frame is sent.

use std::sync::Arc;

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::watch;
use tracing::warn;

use crate::ports::{
    BrokerChannel, BrokerConnection, BrokerConnector, CloseNotifier, CloseSignal, ExchangeKind,
    ExchangeSpec, PublishProperties, TransportError,
};

/// AMQP reply code for a normal close.
const REPLY_SUCCESS: u16 = 200;

/// AMQP delivery mode asking the broker to persist the message.
const DELIVERY_MODE_PERSISTENT: u8 = 2;

const DELIVERY_MODE_TRANSIENT: u8 = 1;

/// Dials brokers with `lapin`.
#[derive(Clone, Default)]
pub struct LapinConnector {
    properties: ConnectionProperties,
}

impl LapinConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom `lapin` connection properties (client name, executor).
    pub fn with_properties(properties: ConnectionProperties) -> Self {
        Self { properties }
    }
}

#[async_trait]
impl BrokerConnector for LapinConnector {
    type Connection = LapinConnection;

    async fn connect(&self, url: &str) -> Result<LapinConnection, TransportError> {
        let connection = Connection::connect(url, self.properties.clone())
            .await
            .map_err(|e| TransportError::new("connect", e.to_string()))?;

        let (signal, _) = watch::channel(CloseSignal::Open);
        let signal = Arc::new(signal);

        let on_error = Arc::clone(&signal);
        connection.on_error(move |err| {
            warn!(error = %err, "AMQP connection error");
            on_error.send_replace(CloseSignal::Abnormal(err.to_string()));
        });

        Ok(LapinConnection { connection, signal })
    }
}

/// A `lapin` connection with its close signal.
pub struct LapinConnection {
    connection: Connection,
    signal: Arc<watch::Sender<CloseSignal>>,
}

#[async_trait]
impl BrokerConnection for LapinConnection {
    type Channel = LapinChannel;

    async fn open_channel(&self) -> Result<LapinChannel, TransportError> {
        self.connection
            .create_channel()
            .await
            .map(LapinChannel)
            .map_err(|e| TransportError::new("channel.open", e.to_string()))
    }

    fn is_open(&self) -> bool {
        self.connection.status().connected()
    }

    fn close_notifier(&self) -> CloseNotifier {
        self.signal.subscribe()
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.signal.send_replace(CloseSignal::Graceful);
        self.connection
            .close(REPLY_SUCCESS, "connection closed by client")
            .await
            .map_err(|e| TransportError::new("connection.close", e.to_string()))
    }
}

/// A `lapin` channel.
pub struct LapinChannel(Channel);

fn lapin_kind(kind: ExchangeKind) -> lapin::ExchangeKind {
    match kind {
        ExchangeKind::Direct => lapin::ExchangeKind::Direct,
        ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
        ExchangeKind::Topic => lapin::ExchangeKind::Topic,
    }
}

#[async_trait]
impl BrokerChannel for LapinChannel {
    fn is_open(&self) -> bool {
        self.0.status().connected()
    }

    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), TransportError> {
        let options = ExchangeDeclareOptions {
            durable: spec.durable,
            auto_delete: spec.auto_delete,
            internal: spec.internal,
            ..ExchangeDeclareOptions::default()
        };

        self.0
            .exchange_declare(&spec.name, lapin_kind(spec.kind), options, FieldTable::default())
            .await
            .map_err(|e| TransportError::new("exchange.declare", e.to_string()))
    }

    async fn declare_transient_queue(&self) -> Result<String, TransportError> {
        let options = QueueDeclareOptions {
            durable: false,
            exclusive: true,
            auto_delete: true,
            ..QueueDeclareOptions::default()
        };

        self.0
            .queue_declare("", options, FieldTable::default())
            .await
            .map(|queue| queue.name().as_str().to_string())
            .map_err(|e| TransportError::new("queue.declare", e.to_string()))
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: &PublishProperties,
    ) -> Result<(), TransportError> {
        let delivery_mode = if properties.persistent {
            DELIVERY_MODE_PERSISTENT
        } else {
            DELIVERY_MODE_TRANSIENT
        };
        let amqp_properties = BasicProperties::default()
            .with_content_type(properties.content_type.as_str().into())
            .with_delivery_mode(delivery_mode)
            .with_timestamp(properties.timestamp);

        // Without confirm mode the returned confirmation resolves immediately.
        self.0
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                amqp_properties,
            )
            .await
            .map(|_confirm| ())
            .map_err(|e| TransportError::new("basic.publish", e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.0
            .close(REPLY_SUCCESS, "channel closed by client")
            .await
            .map_err(|e| TransportError::new("channel.close", e.to_string()))
    }
}
