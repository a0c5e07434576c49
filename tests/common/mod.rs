//! Common helpers for integration tests

#![allow(dead_code)]

use moveecho_client::{ConnectionManager, MemoryBroker};
use moveecho_codec::LocationMessage;
use moveecho_core::{BrokerConfig, TransportTag};
use moveecho_tracking::{ChannelProvider, LoggingHost, MemoryPreferences, TrackingSession};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Path of a file relative to the crate root
pub fn manifest_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

/// Lets spawned tasks run while time is paused
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// One tracking participant wired to a shared in-memory broker.
pub struct Peer {
    pub provider: Arc<ChannelProvider>,
    pub preferences: Arc<MemoryPreferences>,
    pub host: Arc<LoggingHost>,
    pub session: TrackingSession,
    pub received: Arc<Mutex<Vec<LocationMessage>>>,
}

impl Peer {
    pub fn join(broker: &MemoryBroker, config: BrokerConfig, tag: TransportTag) -> Self {
        let provider = Arc::new(ChannelProvider::new());
        let preferences = Arc::new(MemoryPreferences::new(tag));
        let host = Arc::new(LoggingHost::new());
        let manager = ConnectionManager::new(config, broker.transport());
        let session = TrackingSession::new(
            manager,
            provider.clone(),
            preferences.clone(),
            host.clone(),
        );

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        session
            .router()
            .add_observer(move |message: &LocationMessage| -> anyhow::Result<()> {
                sink.lock().push(message.clone());
                Ok(())
            });

        Self {
            provider,
            preferences,
            host,
            session,
            received,
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        self.session.manager()
    }

    pub fn received(&self) -> Vec<LocationMessage> {
        self.received.lock().clone()
    }
}
