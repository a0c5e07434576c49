//! Decoder for location messages
//!
//! Malformed network input is an expected condition, so every failure is a
//! [`DecodeError`] value rather than a panic.

use crate::message::LocationMessage;
use crate::validate::{validate_latitude, validate_longitude, ValidationError};
use moveecho_core::types::{ClientId, TransportTag};
use serde_json::{Map, Value};
use thiserror::Error;

/// Wire names of the required fields, in wire order.
pub const REQUIRED_FIELDS: [&str; 5] = ["clientId", "lat", "lng", "type", "timestamp"];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Field '{field}' out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

impl DecodeError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::Malformed(_) => "malformed",
            DecodeError::MissingField(_) => "missing_field",
            DecodeError::InvalidField { .. } => "invalid_field",
            DecodeError::OutOfRange { .. } => "out_of_range",
        }
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

impl From<ValidationError> for DecodeError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidLatitude(value) => DecodeError::OutOfRange {
                field: "lat",
                value,
            },
            ValidationError::InvalidLongitude(value) => DecodeError::OutOfRange {
                field: "lng",
                value,
            },
            ValidationError::NegativeTimestamp(value) => {
                DecodeError::invalid("timestamp", format!("{} is negative", value))
            }
            ValidationError::EmptyClientId => DecodeError::invalid("clientId", "empty"),
        }
    }
}

/// Decodes and validates a wire payload.
///
/// Unknown extra fields are ignored. Fields are checked in wire order, so the
/// first offending field is the one reported.
pub fn decode(payload: &[u8]) -> Result<LocationMessage, DecodeError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| DecodeError::Malformed(format!("expected a JSON object, got {}", kind_of(&value))))?;

    let client_id = required(object, "clientId")?
        .as_str()
        .ok_or_else(|| DecodeError::invalid("clientId", "expected a string"))?;
    if client_id.is_empty() {
        return Err(ValidationError::EmptyClientId.into());
    }

    let lat = number(object, "lat")?;
    validate_latitude(lat)?;
    let lng = number(object, "lng")?;
    validate_longitude(lng)?;

    let transport = required(object, "type")?
        .as_str()
        .ok_or_else(|| DecodeError::invalid("type", "expected a string"))?
        .parse::<TransportTag>()
        .map_err(|e| DecodeError::invalid("type", e))?;

    let timestamp = required(object, "timestamp")?;
    let timestamp = timestamp
        .as_i64()
        .ok_or_else(|| DecodeError::invalid("timestamp", format!("expected an integer, got {}", timestamp)))?;
    if timestamp < 0 {
        return Err(ValidationError::NegativeTimestamp(timestamp).into());
    }

    Ok(LocationMessage {
        client_id: ClientId::from(client_id),
        lat,
        lng,
        transport,
        timestamp,
    })
}

fn required<'a>(object: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, DecodeError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn number(object: &Map<String, Value>, field: &'static str) -> Result<f64, DecodeError> {
    let value = required(object, field)?;
    value
        .as_f64()
        .ok_or_else(|| DecodeError::invalid(field, format!("expected a number, got {}", kind_of(value))))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
