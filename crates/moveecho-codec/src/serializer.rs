//! Encoder for location messages

use crate::message::LocationMessage;
use crate::validate::{validate_message, ValidationError};
use bytes::Bytes;
use moveecho_core::types::{ClientId, LocationSample, TransportTag};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Field '{field}' out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ValidationError> for EncodeError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidLatitude(value) => EncodeError::OutOfRange {
                field: "lat",
                value,
            },
            ValidationError::InvalidLongitude(value) => EncodeError::OutOfRange {
                field: "lng",
                value,
            },
            ValidationError::NegativeTimestamp(value) => EncodeError::InvalidField {
                field: "timestamp",
                reason: format!("{} is negative", value),
            },
            ValidationError::EmptyClientId => EncodeError::InvalidField {
                field: "clientId",
                reason: "empty".to_string(),
            },
        }
    }
}

/// Encodes a sample into the wire payload.
///
/// The message is validated first so that a payload violating the coordinate
/// invariant is never put on the wire.
pub fn encode(
    client_id: &ClientId,
    sample: &LocationSample,
    transport: TransportTag,
) -> Result<Bytes, EncodeError> {
    let message = LocationMessage::new(client_id.clone(), sample, transport);
    encode_message(&message)
}

/// Encodes an already-built message.
pub fn encode_message(message: &LocationMessage) -> Result<Bytes, EncodeError> {
    validate_message(message)?;
    let json = serde_json::to_vec(message)?;
    Ok(Bytes::from(json))
}
