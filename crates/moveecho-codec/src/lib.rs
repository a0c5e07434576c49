//! Wire codec for MoveEcho location messages
//!
//! Every instance publishes the same JSON object on the shared topic:
//!
//! ```json
//! {"clientId":"MoveEcho-…","lat":37.7749,"lng":-122.4194,"type":"car","timestamp":1700000000000}
//! ```
//!
//! # Features
//!
//! - Encoding validates coordinates first, so an out-of-range message is never produced
//! - Strict decoding: missing, mistyped and out-of-range fields are rejected
//! - Unknown extra fields are ignored
//!
//! # Example
//!
//! ```rust
//! use moveecho_codec::{decode, encode};
//! use moveecho_core::{ClientId, LocationSample, TransportTag};
//!
//! let id = ClientId::from("MoveEcho-demo");
//! let sample = LocationSample::new(37.7749, -122.4194, 1_700_000_000_000);
//!
//! let bytes = encode(&id, &sample, TransportTag::Bike).expect("valid sample");
//! let message = decode(&bytes).expect("round trip");
//! assert_eq!(message.client_id, id);
//! assert_eq!(message.lat, 37.7749);
//! assert_eq!(message.transport, TransportTag::Bike);
//! ```

pub mod message;
pub mod parser;
pub mod serializer;
pub mod validate;

pub use message::LocationMessage;
pub use parser::{decode, DecodeError};
pub use serializer::{encode, encode_message, EncodeError};
pub use validate::{
    validate_coordinates, validate_latitude, validate_longitude, validate_message, ValidationError,
};
