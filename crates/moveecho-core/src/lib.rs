//! # MoveEcho Core
//!
//! Core types, error handling, and configuration for the MoveEcho
//! location-sharing client.
//!
//! - **Types**: `ClientId`, `LocationSample`, `TransportTag`, `QoS` and the
//!   broker connection settings.
//! - **Errors**: `thiserror` enums for every recoverable failure in the
//!   messaging core (`ConnectError`, `PublishError`, `SubscribeError`).
//! - **Configuration**: YAML files with `MOVEECHO__*` environment overrides.
//!
//! ## Example
//!
//! ```
//! use moveecho_core::types::{BrokerConfig, ClientId, TransportTag};
//!
//! let broker = BrokerConfig::builder()
//!     .uri("tcp://127.0.0.1:1883")
//!     .build();
//! assert!(broker.validate().is_ok());
//!
//! let id = ClientId::generate(&broker.client_id_prefix);
//! assert!(id.as_str().starts_with("MoveEcho-"));
//! assert_eq!(TransportTag::from_preference(None), TransportTag::Car);
//! ```

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types for convenience
pub use config::{AppConfig, LogFormat, LoggingConfig, TrackingConfig};
pub use error::{ConfigError, ConnectError, MoveEchoError, PublishError, Result, SubscribeError};
pub use types::{
    AccuracyMode, BrokerAddress, BrokerConfig, ClientId, LocationSample, QoS, ReconnectConfig,
    TransportTag,
};
