//! In-process broker
//!
//! Implements [`BrokerTransport`] without a network so that several
//! managers can talk to each other inside one process. Topic matching is
//! exact; every subscriber of a topic, including the publisher itself,
//! receives each message. Faults can be injected to exercise reconnection.

use crate::transport::{BrokerTransport, TransportEvent, TransportHandle, TransportSession};
use async_trait::async_trait;
use bytes::Bytes;
use moveecho_core::{ClientId, ConnectError, PublishError, QoS, SubscribeError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

const SESSION_QUEUE: usize = 64;

/// A message the broker accepted from a publisher
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub client_id: ClientId,
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retained: bool,
}

struct Session {
    id: u64,
    client_id: ClientId,
    topics: HashSet<String>,
    events: mpsc::Sender<TransportEvent>,
}

#[derive(Default)]
struct BrokerState {
    sessions: Mutex<Vec<Session>>,
    published: Mutex<Vec<PublishedMessage>>,
    next_session: AtomicU64,
    connect_attempts: AtomicU32,
    refuse_next: AtomicU32,
    offline: AtomicBool,
    handshake_delay: Mutex<Option<Duration>>,
}

/// Shared in-memory broker. Cloning yields another handle to the same broker.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that connects to this broker
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            broker: self.clone(),
        }
    }

    /// Refuse every handshake until set back to online
    pub fn set_offline(&self, offline: bool) {
        self.state.offline.store(offline, Ordering::SeqCst);
    }

    /// Refuse the next `count` handshakes
    pub fn refuse_next(&self, count: u32) {
        self.state.refuse_next.store(count, Ordering::SeqCst);
    }

    /// Make every handshake take `delay` before answering
    pub fn set_handshake_delay(&self, delay: Option<Duration>) {
        *self.state.handshake_delay.lock() = delay;
    }

    /// Drops every live session, reporting `reason` to its owner
    pub fn drop_connections(&self, reason: &str) {
        let sessions: Vec<Session> = std::mem::take(&mut *self.state.sessions.lock());
        for session in sessions {
            let _ = session
                .events
                .try_send(TransportEvent::ConnectionLost(reason.to_string()));
        }
    }

    /// Handshakes attempted so far, successful or not
    pub fn connect_attempts(&self) -> u32 {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn session_count(&self) -> usize {
        self.state.sessions.lock().len()
    }

    /// Topics the live session of `client_id` is subscribed to
    pub fn subscriptions(&self, client_id: &ClientId) -> Vec<String> {
        let sessions = self.state.sessions.lock();
        let mut topics: Vec<String> = sessions
            .iter()
            .filter(|s| &s.client_id == client_id)
            .flat_map(|s| s.topics.iter().cloned())
            .collect();
        topics.sort();
        topics
    }

    /// Every message accepted so far, in arrival order
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.published.lock().clone()
    }

    fn open_session(&self, client_id: &ClientId) -> Result<TransportSession, ConnectError> {
        if self.state.offline.load(Ordering::SeqCst) {
            return Err(ConnectError::transport("broker unreachable"));
        }

        let refused = self
            .state
            .refuse_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ConnectError::refused("server unavailable"));
        }

        let id = self.state.next_session.fetch_add(1, Ordering::SeqCst);
        let (events_tx, events_rx) = mpsc::channel(SESSION_QUEUE);

        let mut sessions = self.state.sessions.lock();
        // A second session with the same identity takes over, as on a real broker
        sessions.retain(|s| &s.client_id != client_id);
        sessions.push(Session {
            id,
            client_id: client_id.clone(),
            topics: HashSet::new(),
            events: events_tx,
        });

        debug!(client_id = %client_id, session = id, "In-memory session opened");

        let handle = MemoryHandle {
            broker: self.clone(),
            session: id,
            client_id: client_id.clone(),
        };
        Ok(TransportSession::new(Arc::new(handle), events_rx))
    }

    fn with_session<T>(&self, session: u64, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        let mut sessions = self.state.sessions.lock();
        sessions.iter_mut().find(|s| s.id == session).map(f)
    }
}

/// [`BrokerTransport`] for a [`MemoryBroker`]
#[derive(Clone)]
pub struct MemoryTransport {
    broker: MemoryBroker,
}

#[async_trait]
impl BrokerTransport for MemoryTransport {
    async fn connect(&self, client_id: &ClientId) -> Result<TransportSession, ConnectError> {
        self.broker
            .state
            .connect_attempts
            .fetch_add(1, Ordering::SeqCst);

        let delay = *self.broker.state.handshake_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.broker.open_session(client_id)
    }

    fn describe(&self) -> String {
        "memory://broker".to_string()
    }
}

struct MemoryHandle {
    broker: MemoryBroker,
    session: u64,
    client_id: ClientId,
}

#[async_trait]
impl TransportHandle for MemoryHandle {
    async fn subscribe(&self, topic: &str, _qos: QoS) -> Result<(), SubscribeError> {
        self.broker
            .with_session(self.session, |s| {
                s.topics.insert(topic.to_string());
            })
            .ok_or(SubscribeError::NotConnected)
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), SubscribeError> {
        self.broker
            .with_session(self.session, |s| {
                s.topics.remove(topic);
            })
            .ok_or(SubscribeError::NotConnected)
    }

    fn try_publish(
        &self,
        topic: &str,
        payload: Bytes,
        qos: QoS,
        retained: bool,
    ) -> Result<(), PublishError> {
        let sessions = self.broker.state.sessions.lock();
        if !sessions.iter().any(|s| s.id == self.session) {
            return Err(PublishError::transport("session closed"));
        }

        self.broker.state.published.lock().push(PublishedMessage {
            client_id: self.client_id.clone(),
            topic: topic.to_string(),
            payload: payload.clone(),
            qos,
            retained,
        });

        for session in sessions.iter().filter(|s| s.topics.contains(topic)) {
            // A slow subscriber loses messages rather than blocking the publisher
            let _ = session.events.try_send(TransportEvent::Message {
                topic: topic.to_string(),
                payload: payload.clone(),
            });
        }

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ConnectError> {
        self.broker
            .state
            .sessions
            .lock()
            .retain(|s| s.id != self.session);
        Ok(())
    }
}
