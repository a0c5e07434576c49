//! MoveEcho location tracking
//!
//! Everything above the broker connection: publishing own samples, routing
//! peer samples to observers, and the session that ties both to a location
//! source.
//!
//! # Architecture
//!
//! ```text
//!  LocationProvider ──samples──► pump task ──► LocationPublisher ──┐
//!        (provider.rs)            (session.rs)    (publisher.rs)    │
//!                                      ▲                            ▼
//!                     PreferenceStore ─┘                    ConnectionManager
//!                     (preferences.rs)                      (moveecho-client)
//!                                                                   │
//!  observers ◄── LocationRouter ◄──────── MessageHandler ◄──────────┘
//!                 (router.rs)
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use moveecho_client::{ConnectionManager, MqttTransport};
//! use moveecho_codec::LocationMessage;
//! use moveecho_core::{BrokerConfig, TransportTag};
//! use moveecho_tracking::{LoggingHost, MemoryPreferences, SimulatedProvider, TrackingSession};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BrokerConfig::default();
//!     let manager = ConnectionManager::new(config.clone(), MqttTransport::new(&config)?);
//!
//!     let session = TrackingSession::new(
//!         manager,
//!         Arc::new(SimulatedProvider::new(37.7749, -122.4194)),
//!         Arc::new(MemoryPreferences::new(TransportTag::Car)),
//!         Arc::new(LoggingHost::new()),
//!     );
//!
//!     session.router().add_observer(|m: &LocationMessage| -> anyhow::Result<()> {
//!         println!("{}", m);
//!         Ok(())
//!     });
//!
//!     session.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     session.stop().await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod host;
pub mod metrics;
pub mod preferences;
pub mod provider;
pub mod publisher;
pub mod router;
pub mod session;

pub use error::{HostError, PreferenceError, ProviderError, TrackingError};
pub use host::{ForegroundHost, LoggingHost, NotificationSpec};
pub use metrics::{PublisherMetrics, RouterMetrics, RouterStats};
pub use preferences::{FilePreferences, MemoryPreferences, PreferenceStore};
pub use provider::{ChannelProvider, LocationProvider, LocationRequest, SampleStream, SimulatedProvider};
pub use publisher::LocationPublisher;
pub use router::{LocationObserver, LocationRouter, ObserverId};
pub use session::TrackingSession;
