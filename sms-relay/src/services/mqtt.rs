//! MQTT connection management.
//!
//! [`MqttConnection`] owns one broker connection and a background task that
//! drives the client event loop. Inbound publishes are routed to the
//! [`MessageHandler`] registered for the matching topic filter. Handlers are
//! awaited inline, so deliveries on one connection are processed one at a
//! time and a slow handler delays the next message.

use crate::config::MqttConfig;
use async_trait::async_trait;
use dashmap::DashMap;
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubscribeReasonCode,
};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long `close` waits for the event loop to flush the DISCONNECT.
pub const DISCONNECT_GRACE: Duration = Duration::from_millis(250);

const REQUEST_CHANNEL_CAPACITY: usize = 10;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("invalid MQTT configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to connect to MQTT broker {broker}: {reason}")]
    Connect { broker: String, reason: String },

    #[error("MQTT client not connected, cannot {action} topic {topic}")]
    NotConnected { action: &'static str, topic: String },

    #[error("MQTT request for topic {topic} failed: {source}")]
    Client {
        topic: String,
        #[source]
        source: rumqttc::ClientError,
    },

    #[error("failed to serialize payload for topic {topic}: {source}")]
    Serialize {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Callback invoked for every message delivered on a subscribed topic.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, topic: &str, payload: &[u8]);
}

/// Connection lifecycle notifications.
pub trait ConnectionObserver: Send + Sync {
    fn on_connect(&self) {}
    fn on_connection_lost(&self, _cause: &str) {}
}

/// Observer that only logs lifecycle events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ConnectionObserver for LoggingObserver {
    fn on_connect(&self) {
        info!("MQTT: Connected");
    }

    fn on_connection_lost(&self, cause: &str) {
        warn!(cause = %cause, "MQTT: Connection lost, reconnecting");
    }
}

pub fn qos_from_u8(qos: u8) -> Result<QoS, BusError> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(BusError::InvalidConfig(format!(
            "QoS must be 0, 1 or 2, got {}",
            other
        ))),
    }
}

/// MQTT topic filter matching with `+` (one level) and `#` (remaining levels).
///
/// Topics beginning with `$` are never matched by a leading wildcard.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

struct Subscription {
    qos: QoS,
    handler: Arc<dyn MessageHandler>,
}

/// State shared between the public handle and the event loop task.
struct Shared {
    connected: AtomicBool,
    closed: AtomicBool,
    subscriptions: DashMap<String, Subscription>,
    observer: Arc<dyn ConnectionObserver>,
}

impl Shared {
    async fn dispatch(&self, topic: &str, payload: &[u8]) {
        // Clone handlers out so no map guard is held across an await.
        let handlers: Vec<Arc<dyn MessageHandler>> = self
            .subscriptions
            .iter()
            .filter(|entry| topic_matches(entry.key(), topic))
            .map(|entry| Arc::clone(&entry.value().handler))
            .collect();

        if handlers.is_empty() {
            debug!(topic = %topic, "MQTT: No handler for topic, dropping message");
            return;
        }

        for handler in handlers {
            handler.handle(topic, payload).await;
        }
    }
}

/// A live MQTT connection with automatic reconnection.
pub struct MqttConnection {
    client: AsyncClient,
    broker: String,
    default_qos: QoS,
    retained: bool,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttConnection {
    /// Connect to the broker and start the event loop.
    ///
    /// Returns once the broker has acknowledged the connection, or fails
    /// after `config.connect_timeout`.
    pub async fn connect(
        config: &MqttConfig,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Result<Self, BusError> {
        let (connection, mut eventloop) = Self::build(config, observer)?;

        info!(broker = %connection.broker, client_id = %config.client_id, "MQTT: Connecting");
        wait_for_connack(&mut eventloop, config.connect_timeout)
            .await
            .map_err(|reason| BusError::Connect {
                broker: connection.broker.clone(),
                reason,
            })?;

        connection.shared.connected.store(true, Ordering::SeqCst);
        connection.shared.observer.on_connect();

        let handle = tokio::spawn(run_event_loop(
            eventloop,
            connection.client.clone(),
            Arc::clone(&connection.shared),
            connection.shutdown.clone(),
            config.reconnect_interval,
        ));
        if let Ok(mut task) = connection.task.lock() {
            *task = Some(handle);
        }

        Ok(connection)
    }

    /// Build the client without touching the network.
    fn build(
        config: &MqttConfig,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Result<(Self, EventLoop), BusError> {
        if config.host.trim().is_empty() {
            return Err(BusError::InvalidConfig("host must not be empty".to_string()));
        }
        if config.client_id.trim().is_empty() {
            return Err(BusError::InvalidConfig(
                "client id must not be empty".to_string(),
            ));
        }
        if !config.keep_alive.is_zero() && config.keep_alive < Duration::from_secs(1) {
            return Err(BusError::InvalidConfig(
                "keep alive must be zero or at least one second".to_string(),
            ));
        }
        let default_qos = qos_from_u8(config.qos)?;

        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);
        if let Some(username) = &config.username {
            let password = config
                .password
                .as_ref()
                .map(|p| p.expose_secret().clone())
                .unwrap_or_default();
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        let connection = Self {
            client,
            broker: config.broker_address(),
            default_qos,
            retained: config.retained,
            shared: Arc::new(Shared {
                connected: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                subscriptions: DashMap::new(),
                observer,
            }),
            shutdown: CancellationToken::new(),
            task: Mutex::new(None),
        };

        Ok((connection, eventloop))
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self, action: &'static str, topic: &str) -> Result<(), BusError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(BusError::NotConnected {
                action,
                topic: topic.to_string(),
            })
        }
    }

    /// Register `handler` for `topic` and send the SUBSCRIBE.
    ///
    /// Fails while disconnected; calls are never queued for later. The
    /// subscription is re-issued automatically after each reconnect.
    pub async fn subscribe(
        &self,
        topic: &str,
        qos: u8,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BusError> {
        let qos = qos_from_u8(qos)?;
        self.ensure_connected("subscribe to", topic)?;

        self.shared
            .subscriptions
            .insert(topic.to_string(), Subscription { qos, handler });

        if let Err(source) = self.client.subscribe(topic, qos).await {
            self.shared.subscriptions.remove(topic);
            return Err(BusError::Client {
                topic: topic.to_string(),
                source,
            });
        }

        info!(topic = %topic, qos = ?qos, "MQTT: Subscribed to topic");
        Ok(())
    }

    pub async fn unsubscribe(&self, topic: &str) -> Result<(), BusError> {
        self.ensure_connected("unsubscribe from", topic)?;

        self.client
            .unsubscribe(topic)
            .await
            .map_err(|source| BusError::Client {
                topic: topic.to_string(),
                source,
            })?;
        self.shared.subscriptions.remove(topic);

        info!(topic = %topic, "MQTT: Unsubscribed from topic");
        Ok(())
    }

    /// Publish `payload` as JSON with the configured QoS and retained flag.
    pub async fn publish<T>(&self, topic: &str, payload: &T) -> Result<(), BusError>
    where
        T: Serialize + ?Sized,
    {
        self.ensure_connected("publish to", topic)?;

        let bytes = serde_json::to_vec(payload).map_err(|source| BusError::Serialize {
            topic: topic.to_string(),
            source,
        })?;
        let size = bytes.len();

        self.client
            .publish(topic, self.default_qos, self.retained, bytes)
            .await
            .map_err(|source| BusError::Client {
                topic: topic.to_string(),
                source,
            })?;

        debug!(topic = %topic, payload_size = size, "MQTT: Published message");
        Ok(())
    }

    /// Disconnect and stop the event loop. Safe to call more than once.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.is_connected() {
            if let Err(e) = self.client.disconnect().await {
                warn!(error = %e, "MQTT: Failed to queue disconnect");
            }
        }

        let handle = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(mut handle) = handle {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut handle)
                .await
                .is_err()
            {
                debug!("MQTT: Event loop still busy after grace period, aborting");
                self.shutdown.cancel();
                handle.abort();
            }
        }

        self.shutdown.cancel();
        self.shared.connected.store(false, Ordering::SeqCst);
        info!("MQTT: Disconnected");
    }
}

impl Drop for MqttConnection {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop, timeout: Duration) -> Result<(), String> {
    let handshake = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                Ok(_) => continue,
                Err(e) => return Err(e.to_string()),
            }
        }
    };

    match tokio::time::timeout(timeout, handshake).await {
        Ok(result) => result,
        Err(_) => Err(format!("timed out after {:?}", timeout)),
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    reconnect_interval: Duration,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                shared.dispatch(&publish.topic, &publish.payload).await;
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                shared.connected.store(true, Ordering::SeqCst);
                shared.observer.on_connect();
                resubscribe(&client, &shared);
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                if ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    error!(pkid = ack.pkid, "MQTT: Broker rejected subscription");
                } else {
                    debug!(pkid = ack.pkid, "MQTT: Subscription acknowledged");
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                shared.connected.store(false, Ordering::SeqCst);
                if shared.closed.load(Ordering::SeqCst) {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                let was_connected = shared.connected.swap(false, Ordering::SeqCst);
                if shared.closed.load(Ordering::SeqCst) {
                    break;
                }
                if was_connected {
                    shared.observer.on_connection_lost(&e.to_string());
                } else {
                    debug!(error = %e, "MQTT: Reconnect attempt failed");
                }

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(reconnect_interval) => {}
                }
            }
        }
    }

    shared.connected.store(false, Ordering::SeqCst);
    debug!("MQTT: Event loop stopped");
}

/// Clean sessions drop subscriptions on reconnect; restore them.
fn resubscribe(client: &AsyncClient, shared: &Shared) {
    for entry in shared.subscriptions.iter() {
        match client.try_subscribe(entry.key().as_str(), entry.value().qos) {
            Ok(()) => info!(topic = %entry.key(), "MQTT: Resubscribed to topic"),
            Err(e) => error!(topic = %entry.key(), error = %e, "MQTT: Failed to resubscribe"),
        }
    }
}
