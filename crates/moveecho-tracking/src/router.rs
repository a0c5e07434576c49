//! Inbound message routing
//!
//! The router is the connection manager's single message handler. Each
//! payload is decoded; own messages echoed back by the broker and
//! undecodable payloads are dropped, everything else is handed to every
//! registered observer in registration order.

use crate::metrics::{RouterMetrics, RouterStats};
use moveecho_client::MessageHandler;
use moveecho_codec::{decode, LocationMessage};
use moveecho_core::ClientId;
use parking_lot::RwLock;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Receives peer locations.
///
/// Called on the connection's driver task; keep it short. An error or a
/// panic is logged and does not affect other observers.
pub trait LocationObserver: Send + Sync {
    fn on_location(&self, message: &LocationMessage) -> anyhow::Result<()>;
}

impl<F> LocationObserver for F
where
    F: Fn(&LocationMessage) -> anyhow::Result<()> + Send + Sync,
{
    fn on_location(&self, message: &LocationMessage) -> anyhow::Result<()> {
        self(message)
    }
}

/// Handle returned by [`LocationRouter::add_observer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

type Registry = Vec<(ObserverId, Arc<dyn LocationObserver>)>;

pub struct LocationRouter {
    own_id: ClientId,
    observers: RwLock<Registry>,
    next_id: AtomicU64,
    metrics: RouterMetrics,
}

impl LocationRouter {
    /// Router that drops messages carrying `own_id`
    pub fn new(own_id: ClientId) -> Self {
        Self {
            own_id,
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            metrics: RouterMetrics::new(),
        }
    }

    pub fn add_observer<O: LocationObserver + 'static>(&self, observer: O) -> ObserverId {
        self.add_shared_observer(Arc::new(observer))
    }

    pub fn add_shared_observer(&self, observer: Arc<dyn LocationObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        debug!(observer = %id, "Observer added");
        id
    }

    /// Returns false if `id` was not registered
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        let removed = observers.len() != before;
        if removed {
            debug!(observer = %id, "Observer removed");
        }
        removed
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    pub fn own_id(&self) -> &ClientId {
        &self.own_id
    }

    pub fn stats(&self) -> RouterStats {
        self.metrics.snapshot()
    }

    /// Decodes `payload` and fans it out
    pub fn route(&self, topic: &str, payload: &[u8]) {
        let message = match decode(payload) {
            Ok(message) => message,
            Err(e) => {
                self.metrics.record_malformed(e.kind());
                warn!(topic = topic, error = %e, "Dropping undecodable location message");
                return;
            }
        };

        if message.client_id == self.own_id {
            self.metrics.record_self_echo();
            trace!("Dropping own location echoed by broker");
            return;
        }

        self.deliver(&message);
    }

    fn deliver(&self, message: &LocationMessage) {
        // Snapshot so observers can add or remove observers re-entrantly
        let observers: Registry = self.observers.read().clone();

        debug!(
            peer = %message.client_id,
            lat = message.lat,
            lng = message.lng,
            transport = %message.transport,
            observers = observers.len(),
            "Received peer location"
        );

        for (id, observer) in &observers {
            match catch_unwind(AssertUnwindSafe(|| observer.on_location(message))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.metrics.record_observer_failure();
                    warn!(observer = %id, error = %e, "Observer failed");
                }
                Err(_) => {
                    self.metrics.record_observer_failure();
                    warn!(observer = %id, "Observer panicked");
                }
            }
        }

        self.metrics.record_delivered();
    }
}

impl MessageHandler for LocationRouter {
    fn on_message(&self, topic: &str, payload: &[u8]) {
        self.route(topic, payload);
    }
}
