//! Seam between the connection manager and the wire.
//!
//! A [`BrokerTransport`] performs one handshake per call. The resulting
//! [`TransportSession`] carries a handle for outbound requests and a channel
//! of inbound events; the session ends when the channel yields
//! [`TransportEvent::ConnectionLost`] or closes.

use async_trait::async_trait;
use bytes::Bytes;
use moveecho_core::{ClientId, ConnectError, PublishError, QoS, SubscribeError};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Something that happened on a live session
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A message arrived on a subscribed topic
    Message { topic: String, payload: Bytes },
    /// The session is gone; no further events follow
    ConnectionLost(String),
}

/// Outbound side of a live session
#[async_trait]
pub trait TransportHandle: Send + Sync {
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), SubscribeError>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), SubscribeError>;

    /// Queues a publish without waiting. A full outbound queue is
    /// [`PublishError::Backpressure`].
    fn try_publish(
        &self,
        topic: &str,
        payload: Bytes,
        qos: QoS,
        retained: bool,
    ) -> Result<(), PublishError>;

    /// Best-effort close
    async fn disconnect(&self) -> Result<(), ConnectError>;
}

/// One established broker session
pub struct TransportSession {
    pub handle: Arc<dyn TransportHandle>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl TransportSession {
    pub fn new(handle: Arc<dyn TransportHandle>, events: mpsc::Receiver<TransportEvent>) -> Self {
        Self { handle, events }
    }
}

impl fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSession").finish_non_exhaustive()
    }
}

/// Factory for broker sessions
#[async_trait]
pub trait BrokerTransport: Send + Sync + 'static {
    /// Performs the handshake. Returns once the broker has accepted the
    /// session, or with the reason it did not.
    async fn connect(&self, client_id: &ClientId) -> Result<TransportSession, ConnectError>;

    /// Human-readable target for logs
    fn describe(&self) -> String;
}
