//! Broker connection manager
//!
//! Owns the connection state machine:
//!
//! ```text
//! Disconnected --connect()--> Connecting --ok--> Connected
//!                                  |                 |
//!                                  | fail            | lost
//!                                  v                 v
//!         Failed <--budget spent-- Reconnecting <----+
//!                                  |
//!                                  +--after delay--> Connecting
//! ```
//!
//! A background driver task performs handshakes, waits out retry delays and
//! pumps inbound messages into the registered [`MessageHandler`].
//! `disconnect()` cancels the driver wherever it is.

use crate::client::{calculate_backoff, HealthCheck, HealthStatus, MessageHandler};
use crate::state::{ConnectionState, ConnectionStatus, MetricsSnapshot};
use crate::transport::{BrokerTransport, TransportEvent, TransportHandle, TransportSession};
use bytes::Bytes;
use moveecho_core::{BrokerConfig, ClientId, ConnectError, PublishError, QoS, SubscribeError};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Idle time after which a live connection reports as degraded
const IDLE_THRESHOLD: Duration = Duration::from_secs(60);

struct Driver {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct Inner {
    config: BrokerConfig,
    client_id: ClientId,
    transport: Arc<dyn BrokerTransport>,
    status: ConnectionStatus,
    session: Mutex<Option<Arc<dyn TransportHandle>>>,
    subscriptions: Mutex<Vec<String>>,
    handler: RwLock<Option<Arc<dyn MessageHandler>>>,
    driver: Mutex<Option<Driver>>,
}

/// Resilient connection to the shared broker.
///
/// Cloning is cheap and every clone controls the same connection.
///
/// # Example
///
/// ```rust,no_run
/// use moveecho_client::{ConnectionManager, MqttTransport};
/// use moveecho_core::BrokerConfig;
///
/// # async fn run() -> anyhow::Result<()> {
/// let config = BrokerConfig::builder().uri("tcp://127.0.0.1:1883").build();
/// let transport = MqttTransport::new(&config)?;
/// let manager = ConnectionManager::new(config, transport);
///
/// manager.set_message_callback(|topic: &str, payload: &[u8]| {
///     println!("{}: {} bytes", topic, payload.len());
/// });
/// manager.connect();
/// manager.subscribe("moveecho/locations").await?;
/// // ...
/// manager.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Creates a manager with a freshly generated client identity. No
    /// connection is attempted until [`connect`](Self::connect).
    pub fn new<T: BrokerTransport>(config: BrokerConfig, transport: T) -> Self {
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: BrokerConfig, transport: Arc<dyn BrokerTransport>) -> Self {
        let client_id = ClientId::generate(&config.client_id_prefix);
        debug!(client_id = %client_id, broker = %transport.describe(), "Connection manager created");

        Self {
            inner: Arc::new(Inner {
                config,
                client_id,
                transport,
                status: ConnectionStatus::new(),
                session: Mutex::new(None),
                subscriptions: Mutex::new(Vec::new()),
                handler: RwLock::new(None),
                driver: Mutex::new(None),
            }),
        }
    }

    /// Starts connecting in the background.
    ///
    /// Does nothing while a connection is live or being established. From
    /// `Disconnected` or `Failed` the retry budget starts over.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let mut driver = self.inner.driver.lock();

        let started = self.inner.status.transition(|state| match state {
            ConnectionState::Disconnected | ConnectionState::Failed => {
                Some(ConnectionState::Connecting)
            }
            _ => None,
        });

        if !started {
            debug!(state = %self.state(), "connect() ignored, connection already active");
            return;
        }

        info!(
            client_id = %self.inner.client_id,
            broker = %self.inner.transport.describe(),
            "Connecting to broker"
        );

        // A driver left over from a Failed state has already returned
        if let Some(previous) = driver.take() {
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.inner.clone().run(cancel.clone()));
        *driver = Some(Driver { cancel, task });
    }

    /// Tears the connection down and always ends `Disconnected`.
    ///
    /// Cancels a pending retry or an in-flight handshake. Errors while
    /// closing the session are logged, not returned.
    pub async fn disconnect(&self) {
        let driver = self.inner.driver.lock().take();

        if let Some(driver) = driver {
            driver.cancel.cancel();
            if let Err(e) = driver.task.await {
                if e.is_panic() {
                    error!(error = %e, "Connection driver panicked");
                }
            }
        }

        let session = self.inner.session.lock().take();
        if let Some(session) = session {
            if let Err(e) = session.disconnect().await {
                warn!(error = %e, "Error closing broker session");
            }
        }

        self.inner.status.metrics().mark_disconnected();

        // A concurrent connect() may have started a new driver meanwhile
        if self.inner.driver.lock().is_none() {
            let previous = self.inner.status.set_state(ConnectionState::Disconnected);
            if previous != ConnectionState::Disconnected {
                info!(client_id = %self.inner.client_id, "Disconnected from broker");
            }
        }
    }

    /// Publishes `payload` without blocking.
    ///
    /// Returns [`PublishError::NotConnected`] unless the state is
    /// `Connected`, in which case nothing is written.
    pub fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        qos: QoS,
        retained: bool,
    ) -> Result<(), PublishError> {
        if !self.inner.status.is_connected() {
            return Err(PublishError::NotConnected);
        }

        let session = self
            .inner
            .session
            .lock()
            .clone()
            .ok_or(PublishError::NotConnected)?;

        let size = payload.len() as u64;
        match session.try_publish(topic, payload, qos, retained) {
            Ok(()) => {
                self.inner.status.metrics().record_sent(size);
                debug!(topic = topic, size = size, "Message published");
                Ok(())
            }
            Err(e) => {
                self.inner.status.metrics().record_error();
                Err(e)
            }
        }
    }

    /// Publishes on the configured topic with the configured QoS and retain
    /// flag.
    pub fn publish_default(&self, payload: Bytes) -> Result<(), PublishError> {
        let config = &self.inner.config;
        self.publish(&config.topic, payload, config.qos, config.retained)
    }

    /// Records `topic` and subscribes to it now if a session is live.
    ///
    /// Recorded topics are reissued every time a session is established, so
    /// subscribing while disconnected is not an error.
    pub async fn subscribe(&self, topic: &str) -> Result<(), SubscribeError> {
        {
            let mut subscriptions = self.inner.subscriptions.lock();
            if !subscriptions.iter().any(|t| t == topic) {
                subscriptions.push(topic.to_string());
            }
        }

        let session = self.inner.session.lock().clone();
        match session {
            Some(session) => {
                session.subscribe(topic, self.inner.config.qos).await?;
                debug!(topic = topic, "Subscribed");
                Ok(())
            }
            None => {
                debug!(topic = topic, "Not connected, subscription deferred");
                Ok(())
            }
        }
    }

    /// Forgets `topic` and unsubscribes from it if a session is live.
    pub async fn unsubscribe(&self, topic: &str) -> Result<(), SubscribeError> {
        self.inner.subscriptions.lock().retain(|t| t != topic);

        let session = self.inner.session.lock().clone();
        if let Some(session) = session {
            session.unsubscribe(topic).await?;
            debug!(topic = topic, "Unsubscribed");
        }
        Ok(())
    }

    /// Installs the single message handler, replacing any previous one.
    pub fn set_message_callback<H: MessageHandler + 'static>(&self, handler: H) {
        self.set_message_handler(Arc::new(handler));
    }

    pub fn set_message_handler(&self, handler: Arc<dyn MessageHandler>) {
        *self.inner.handler.write() = Some(handler);
    }

    pub fn clear_message_handler(&self) {
        *self.inner.handler.write() = None;
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.status.state()
    }

    /// Receiver notified on every state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.status.watch()
    }

    /// Waits until the state equals `target`. Returns false if the manager
    /// went away first.
    pub async fn wait_for_state(&self, target: ConnectionState) -> bool {
        let mut rx = self.watch_state();
        let reached = rx.wait_for(|state| *state == target).await.is_ok();
        reached
    }

    pub fn is_connected(&self) -> bool {
        self.inner.status.is_connected()
    }

    pub fn client_id(&self) -> &ClientId {
        &self.inner.client_id
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    /// Most recent handshake or connection error
    pub fn last_error(&self) -> Option<String> {
        self.inner.status.error_message()
    }

    /// Topics that will be (re)issued on every new session
    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.subscriptions.lock().clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.status.metrics().snapshot()
    }

    pub fn health_check(&self) -> HealthCheck {
        let metrics = self.inner.status.metrics();

        let status = match self.state() {
            ConnectionState::Connected => {
                if metrics.time_since_last_activity() > IDLE_THRESHOLD {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                }
            }
            ConnectionState::Connecting | ConnectionState::Reconnecting => HealthStatus::Degraded,
            ConnectionState::Disconnected => HealthStatus::Disconnected,
            ConnectionState::Failed => HealthStatus::Unhealthy,
        };

        HealthCheck {
            status,
            message: self.last_error(),
            idle: metrics.connected_at().map(|_| metrics.time_since_last_activity()),
        }
    }
}

enum SessionEnd {
    Cancelled,
    Lost(String),
}

impl Inner {
    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let reconnect = &self.config.reconnect;
        let mut failures: u32 = 0;

        loop {
            self.status.set_state(ConnectionState::Connecting);

            let handshake = tokio::time::timeout(
                self.config.connect_timeout(),
                self.transport.connect(&self.client_id),
            );

            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = handshake => result.unwrap_or_else(|_| Err(ConnectError::Timeout {
                    timeout_secs: self.config.connect_timeout_secs,
                })),
            };

            match attempt {
                Ok(session) => {
                    failures = 0;
                    match self.serve(session, &cancel).await {
                        SessionEnd::Cancelled => return,
                        SessionEnd::Lost(reason) => {
                            self.status.set_error(format!("Connection lost: {}", reason));

                            if !reconnect.enabled {
                                error!(reason = %reason, "Connection lost, auto-reconnect disabled");
                                self.status.set_state(ConnectionState::Failed);
                                return;
                            }

                            warn!(reason = %reason, "Connection lost, will reconnect");
                            self.status.set_state(ConnectionState::Reconnecting);
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    self.status.set_error(e.to_string());

                    if !reconnect.enabled || failures >= reconnect.max_attempts {
                        error!(
                            attempt = failures,
                            error = %e,
                            "Giving up on broker connection"
                        );
                        self.status.set_state(ConnectionState::Failed);
                        return;
                    }

                    self.status.set_state(ConnectionState::Reconnecting);
                }
            }

            let delay = calculate_backoff(failures.saturating_sub(1), reconnect);
            warn!(
                attempt = failures,
                max_attempts = reconnect.max_attempts,
                delay_secs = delay.as_secs_f64(),
                "Retrying broker connection after delay"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Pending reconnect cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            self.status.metrics().record_reconnect();
        }
    }

    /// Runs one established session until it is lost or cancelled.
    async fn serve(&self, session: TransportSession, cancel: &CancellationToken) -> SessionEnd {
        let TransportSession { handle, mut events } = session;
        *self.session.lock() = Some(handle.clone());

        let topics = self.subscriptions.lock().clone();
        for topic in &topics {
            if let Err(e) = handle.subscribe(topic, self.config.qos).await {
                warn!(topic = %topic, error = %e, "Failed to restore subscription");
            }
        }

        self.status.clear_error();
        self.status.metrics().mark_connected();
        self.status.set_state(ConnectionState::Connected);
        info!(
            client_id = %self.client_id,
            subscriptions = topics.len(),
            "Connected to broker"
        );

        let end = loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break SessionEnd::Cancelled,
                event = events.recv() => event,
            };

            match event {
                Some(TransportEvent::Message { topic, payload }) => self.dispatch(&topic, &payload),
                Some(TransportEvent::ConnectionLost(reason)) => break SessionEnd::Lost(reason),
                None => break SessionEnd::Lost("event stream closed".to_string()),
            }
        };

        if let SessionEnd::Lost(_) = end {
            self.session.lock().take();
            self.status.metrics().mark_disconnected();
        }

        end
    }

    fn dispatch(&self, topic: &str, payload: &[u8]) {
        self.status.metrics().record_received(payload.len() as u64);

        let handler = self.handler.read().clone();
        let Some(handler) = handler else {
            debug!(topic = topic, "No message handler installed, dropping message");
            return;
        };

        if catch_unwind(AssertUnwindSafe(|| handler.on_message(topic, payload))).is_err() {
            error!(topic = topic, "Message handler panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBroker;
    use moveecho_core::ReconnectConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOPIC: &str = "moveecho/locations";

    fn config() -> BrokerConfig {
        BrokerConfig::builder().uri("tcp://127.0.0.1:1883").build()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connects_and_publishes() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(config(), broker.transport());
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        manager.connect();
        settle().await;

        assert_eq!(manager.state(), ConnectionState::Connected);
        manager
            .publish_default(Bytes::from_static(b"payload"))
            .unwrap();

        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, TOPIC);
        assert_eq!(published[0].qos, QoS::AtMostOnce);
        assert!(!published[0].retained);
        assert_eq!(&published[0].client_id, manager.client_id());
        assert_eq!(manager.metrics().messages_sent, 1);

        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(broker.session_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_while_not_connected_writes_nothing() {
        let broker = MemoryBroker::new();
        broker.set_handshake_delay(Some(Duration::from_secs(1)));
        let manager = ConnectionManager::new(config(), broker.transport());

        assert_eq!(
            manager.publish_default(Bytes::from_static(b"x")),
            Err(PublishError::NotConnected)
        );

        manager.connect();
        settle().await;
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(
            manager.publish_default(Bytes::from_static(b"x")),
            Err(PublishError::NotConnected)
        );

        assert!(broker.published().is_empty());
        manager.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_exhaust_budget() {
        let broker = MemoryBroker::new();
        broker.set_offline(true);
        let manager = ConnectionManager::new(config(), broker.transport());

        manager.connect();
        settle().await;

        for attempt in 1..5 {
            assert_eq!(broker.connect_attempts(), attempt);
            assert_eq!(manager.state(), ConnectionState::Reconnecting);
            tokio::time::sleep(Duration::from_secs(5)).await;
        }

        assert_eq!(broker.connect_attempts(), 5);
        assert_eq!(manager.state(), ConnectionState::Failed);
        assert!(manager.last_error().is_some());
        assert_eq!(manager.health_check().status, HealthStatus::Unhealthy);

        // No attempts once the budget is spent
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(broker.connect_attempts(), 5);
        assert_eq!(manager.state(), ConnectionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_after_failed_resets_budget() {
        let broker = MemoryBroker::new();
        broker.set_offline(true);
        let mut config = config();
        config.reconnect.max_attempts = 2;
        let manager = ConnectionManager::new(config, broker.transport());

        manager.connect();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(manager.state(), ConnectionState::Failed);
        assert_eq!(broker.connect_attempts(), 2);

        manager.connect();
        settle().await;
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        assert_eq!(broker.connect_attempts(), 3);

        broker.set_offline(false);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.last_error().is_none());

        manager.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_before_budget_spent() {
        let broker = MemoryBroker::new();
        broker.refuse_next(4);
        let manager = ConnectionManager::new(config(), broker.transport());

        manager.connect();
        tokio::time::sleep(Duration::from_secs(21)).await;

        assert_eq!(broker.connect_attempts(), 5);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.metrics().reconnect_attempts, 4);
        manager.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_retry() {
        let broker = MemoryBroker::new();
        broker.set_offline(true);
        let manager = ConnectionManager::new(config(), broker.transport());

        manager.connect();
        settle().await;
        assert_eq!(manager.state(), ConnectionState::Reconnecting);

        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(broker.connect_attempts(), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_inflight_handshake() {
        let broker = MemoryBroker::new();
        broker.set_handshake_delay(Some(Duration::from_secs(3)));
        let manager = ConnectionManager::new(config(), broker.transport());

        manager.connect();
        settle().await;
        manager.disconnect().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(broker.session_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout_counts_as_failure() {
        let broker = MemoryBroker::new();
        broker.set_handshake_delay(Some(Duration::from_secs(30)));
        let manager = ConnectionManager::new(config(), broker.transport());

        manager.connect();
        tokio::time::sleep(Duration::from_millis(10_010)).await;

        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        let error = manager.last_error().unwrap();
        assert!(error.contains("timeout"), "unexpected error: {}", error);
        manager.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_noop_while_active() {
        let broker = MemoryBroker::new();
        broker.set_offline(true);
        let manager = ConnectionManager::new(config(), broker.transport());

        manager.connect();
        settle().await;
        assert_eq!(manager.state(), ConnectionState::Reconnecting);

        manager.connect();
        manager.connect();
        settle().await;
        assert_eq!(broker.connect_attempts(), 1);

        broker.set_offline(false);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(manager.state(), ConnectionState::Connected);

        manager.connect();
        settle().await;
        assert_eq!(broker.connect_attempts(), 2);
        manager.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_lost_reconnects_and_resubscribes() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(config(), broker.transport());

        // Recorded before any session exists
        manager.subscribe(TOPIC).await.unwrap();
        assert_eq!(manager.subscriptions(), vec![TOPIC.to_string()]);

        manager.connect();
        settle().await;
        assert_eq!(broker.subscriptions(manager.client_id()), vec![TOPIC]);

        broker.drop_connections("link down");
        settle().await;
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        assert!(manager.last_error().unwrap().contains("link down"));
        assert_eq!(
            manager.publish_default(Bytes::new()),
            Err(PublishError::NotConnected)
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(broker.subscriptions(manager.client_id()), vec![TOPIC]);
        manager.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_loss_without_auto_reconnect_fails() {
        let broker = MemoryBroker::new();
        let mut config = config();
        config.reconnect = ReconnectConfig {
            enabled: false,
            ..Default::default()
        };
        let manager = ConnectionManager::new(config, broker.transport());

        manager.connect();
        settle().await;
        broker.drop_connections("gone");
        settle().await;

        assert_eq!(manager.state(), ConnectionState::Failed);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(broker.connect_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_reach_latest_handler() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(config(), broker.transport());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        manager.set_message_callback(move |_: &str, _: &[u8]| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        manager.connect();
        manager.subscribe(TOPIC).await.unwrap();
        settle().await;

        manager.publish_default(Bytes::from_static(b"one")).unwrap();
        settle().await;
        assert_eq!(first.load(Ordering::SeqCst), 1);

        let counter = second.clone();
        manager.set_message_callback(move |_: &str, _: &[u8]| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        manager.publish_default(Bytes::from_static(b"two")).unwrap();
        settle().await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(manager.metrics().messages_received, 2);
        manager.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_handler_keeps_driver_alive() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(config(), broker.transport());
        manager.set_message_callback(|_: &str, _: &[u8]| {
            panic!("handler bug");
        });

        manager.connect();
        manager.subscribe(TOPIC).await.unwrap();
        settle().await;

        manager.publish_default(Bytes::from_static(b"boom")).unwrap();
        settle().await;

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.publish_default(Bytes::from_static(b"again")).is_ok());
        manager.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_forgets_topic() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(config(), broker.transport());

        manager.connect();
        settle().await;
        manager.subscribe(TOPIC).await.unwrap();
        manager.subscribe(TOPIC).await.unwrap();
        assert_eq!(manager.subscriptions().len(), 1);

        manager.unsubscribe(TOPIC).await.unwrap();
        assert!(manager.subscriptions().is_empty());
        assert!(broker.subscriptions(manager.client_id()).is_empty());
        manager.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_state() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(config(), broker.transport());

        manager.connect();
        assert!(manager.wait_for_state(ConnectionState::Connected).await);
        assert_eq!(manager.health_check().status, HealthStatus::Healthy);
        manager.disconnect().await;
        assert_eq!(manager.health_check().status, HealthStatus::Disconnected);
    }

    #[test]
    fn test_client_id_uses_prefix() {
        let mut config = config();
        config.client_id_prefix = "Tester".to_string();
        let manager = ConnectionManager::new(config, MemoryBroker::new().transport());
        assert!(manager.client_id().as_str().starts_with("Tester-"));
    }
}
