//! # moveecho-client
//!
//! Resilient publish/subscribe connection to the shared MoveEcho broker.
//!
//! - **ConnectionManager**: connection state machine with a bounded retry
//!   budget, deferred subscriptions that survive reconnects, and a single
//!   inbound message handler
//! - **MqttTransport**: MQTT 3.1.1 over TCP, built on `rumqttc`
//! - **MemoryBroker**: in-process broker with fault injection, available
//!   with the `test-util` feature
//!
//! ## Example
//!
//! ```rust,no_run
//! use moveecho_client::{ConnectionManager, ConnectionState, MqttTransport};
//! use moveecho_core::BrokerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BrokerConfig::builder().uri("tcp://127.0.0.1:1883").build();
//!     let manager = ConnectionManager::new(config.clone(), MqttTransport::new(&config)?);
//!
//!     manager.connect();
//!     manager.wait_for_state(ConnectionState::Connected).await;
//!     manager.publish_default(bytes::Bytes::from_static(b"{}"))?;
//!
//!     manager.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod manager;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod mqtt;
pub mod state;
pub mod transport;

// Re-export commonly used types
pub use client::{calculate_backoff, HealthCheck, HealthStatus, MessageHandler};
pub use manager::ConnectionManager;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryBroker, MemoryTransport, PublishedMessage};
pub use mqtt::MqttTransport;
pub use state::{ConnectionMetrics, ConnectionState, ConnectionStatus, MetricsSnapshot};
pub use transport::{BrokerTransport, TransportEvent, TransportHandle, TransportSession};

// Re-export bytes for convenience
pub use bytes::Bytes;
