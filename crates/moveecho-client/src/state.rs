use metrics::{counter, describe_counter};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;

/// Connection state of the broker connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection and no pending attempt
    Disconnected,
    /// A handshake is in flight
    Connecting,
    /// Handshake completed, publishing allowed
    Connected,
    /// Waiting out the retry delay after a failure or a lost connection
    Reconnecting,
    /// Retry budget exhausted; terminal until the next `connect()`
    Failed,
}

impl ConnectionState {
    /// True while a driver task owns the connection (handshake, live session
    /// or retry wait).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Reconnecting
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Reconnecting => write!(f, "Reconnecting"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

static DESCRIBE: Once = Once::new();

fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!("moveecho_messages_sent_total", "Location messages handed to the broker");
        describe_counter!("moveecho_messages_received_total", "Messages received from the broker");
        describe_counter!("moveecho_publish_errors_total", "Publish calls rejected by the transport");
        describe_counter!("moveecho_reconnect_attempts_total", "Handshakes retried after a failure");
    });
}

/// Per-connection statistics
///
/// Counters are kept locally for snapshots and mirrored into the global
/// `metrics` recorder, if one is installed.
#[derive(Debug, Clone)]
pub struct ConnectionMetrics {
    bytes_sent: Arc<AtomicU64>,
    bytes_received: Arc<AtomicU64>,
    messages_sent: Arc<AtomicU64>,
    messages_received: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
    reconnect_attempts: Arc<AtomicUsize>,
    last_activity: Arc<parking_lot::RwLock<SystemTime>>,
    connected_at: Arc<parking_lot::RwLock<Option<SystemTime>>>,
}

impl Default for ConnectionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        describe_metrics();

        Self {
            bytes_sent: Arc::new(AtomicU64::new(0)),
            bytes_received: Arc::new(AtomicU64::new(0)),
            messages_sent: Arc::new(AtomicU64::new(0)),
            messages_received: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(AtomicU64::new(0)),
            reconnect_attempts: Arc::new(AtomicUsize::new(0)),
            last_activity: Arc::new(parking_lot::RwLock::new(SystemTime::now())),
            connected_at: Arc::new(parking_lot::RwLock::new(None)),
        }
    }

    /// Record one outbound message of `bytes` length
    pub fn record_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        counter!("moveecho_messages_sent_total").increment(1);
        self.update_last_activity();
    }

    /// Record one inbound message of `bytes` length
    pub fn record_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        counter!("moveecho_messages_received_total").increment(1);
        self.update_last_activity();
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        counter!("moveecho_publish_errors_total").increment(1);
    }

    pub fn record_reconnect(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
        counter!("moveecho_reconnect_attempts_total").increment(1);
    }

    pub fn update_last_activity(&self) {
        *self.last_activity.write() = SystemTime::now();
    }

    /// Mark connection as established
    pub fn mark_connected(&self) {
        *self.connected_at.write() = Some(SystemTime::now());
        self.update_last_activity();
    }

    /// Mark connection as gone
    pub fn mark_disconnected(&self) {
        *self.connected_at.write() = None;
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn reconnect_attempts(&self) -> usize {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    pub fn last_activity(&self) -> SystemTime {
        *self.last_activity.read()
    }

    pub fn connected_at(&self) -> Option<SystemTime> {
        *self.connected_at.read()
    }

    /// Time since the last message in either direction
    pub fn time_since_last_activity(&self) -> Duration {
        self.last_activity()
            .elapsed()
            .unwrap_or(Duration::from_secs(0))
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_sent: self.bytes_sent(),
            bytes_received: self.bytes_received(),
            messages_sent: self.messages_sent(),
            messages_received: self.messages_received(),
            errors: self.errors(),
            reconnect_attempts: self.reconnect_attempts(),
            last_activity: self.last_activity(),
            connected_at: self.connected_at(),
        }
    }
}

/// Snapshot of connection metrics at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub errors: u64,
    pub reconnect_attempts: usize,
    pub last_activity: SystemTime,
    pub connected_at: Option<SystemTime>,
}

impl MetricsSnapshot {
    /// Errors per outbound message
    pub fn error_rate(&self) -> f64 {
        let attempts = self.messages_sent + self.errors;
        if attempts > 0 {
            self.errors as f64 / attempts as f64
        } else {
            0.0
        }
    }
}

/// Connection state, metrics and last error, shared between the manager and
/// its driver task.
///
/// The state lives in a watch channel: readers get the current value without
/// locking and can await changes, and [`transition`](Self::transition) gives
/// an atomic read-modify-write.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    state: Arc<watch::Sender<ConnectionState>>,
    metrics: ConnectionMetrics,
    last_error: Arc<parking_lot::RwLock<Option<String>>>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStatus {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state: Arc::new(state),
            metrics: ConnectionMetrics::new(),
            last_error: Arc::new(parking_lot::RwLock::new(None)),
        }
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Set connection state unconditionally; returns the previous one
    pub fn set_state(&self, state: ConnectionState) -> ConnectionState {
        self.state.send_replace(state)
    }

    /// Applies `f` to the current state under the channel lock. Returns true
    /// when `f` produced a new state.
    pub fn transition<F>(&self, f: F) -> bool
    where
        F: FnOnce(ConnectionState) -> Option<ConnectionState>,
    {
        self.state.send_if_modified(|current| match f(*current) {
            Some(next) if next != *current => {
                *current = next;
                true
            }
            _ => false,
        })
    }

    pub fn metrics(&self) -> &ConnectionMetrics {
        &self.metrics
    }

    pub fn set_error(&self, error: impl Into<String>) {
        *self.last_error.write() = Some(error.into());
    }

    pub fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    pub fn error_message(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state(), ConnectionState::Connected)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state(), ConnectionState::Failed)
    }
}
