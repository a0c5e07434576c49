//! Validation for location messages

use crate::message::LocationMessage;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    #[error("Invalid timestamp: {0} (must not be negative)")]
    NegativeTimestamp(i64),

    #[error("Empty client id")]
    EmptyClientId,
}

/// Validates a latitude in decimal degrees
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    // NaN fails both comparisons, so test for the valid range instead
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationError::InvalidLatitude(lat));
    }
    Ok(())
}

/// Validates a longitude in decimal degrees
pub fn validate_longitude(lng: f64) -> Result<(), ValidationError> {
    if !(-180.0..=180.0).contains(&lng) {
        return Err(ValidationError::InvalidLongitude(lng));
    }
    Ok(())
}

/// Validates a latitude/longitude pair
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), ValidationError> {
    validate_latitude(lat)?;
    validate_longitude(lng)
}

/// Validates a complete message
pub fn validate_message(message: &LocationMessage) -> Result<(), ValidationError> {
    if message.client_id.as_str().is_empty() {
        return Err(ValidationError::EmptyClientId);
    }

    validate_coordinates(message.lat, message.lng)?;

    if message.timestamp < 0 {
        return Err(ValidationError::NegativeTimestamp(message.timestamp));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use moveecho_core::types::{ClientId, LocationSample, TransportTag};

    fn create_valid_message() -> LocationMessage {
        LocationMessage::new(
            ClientId::from("MoveEcho-test"),
            &LocationSample::new(37.7749, -122.4194, 1_700_000_000_000),
            TransportTag::Car,
        )
    }

    #[test]
    fn test_valid_message() {
        assert!(validate_message(&create_valid_message()).is_ok());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_invalid_latitude() {
        let mut message = create_valid_message();
        message.lat = 91.0;
        assert!(matches!(
            validate_message(&message),
            Err(ValidationError::InvalidLatitude(_))
        ));
    }

    #[test]
    fn test_invalid_longitude() {
        let mut message = create_valid_message();
        message.lng = -181.0;
        assert!(matches!(
            validate_message(&message),
            Err(ValidationError::InvalidLongitude(_))
        ));
    }

    #[test]
    fn test_nan_rejected() {
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
        assert!(validate_coordinates(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_empty_client_id() {
        let mut message = create_valid_message();
        message.client_id = ClientId::from("");
        assert_eq!(
            validate_message(&message),
            Err(ValidationError::EmptyClientId)
        );
    }

    #[test]
    fn test_negative_timestamp() {
        let mut message = create_valid_message();
        message.timestamp = -1;
        assert!(matches!(
            validate_message(&message),
            Err(ValidationError::NegativeTimestamp(-1))
        ));
    }
}
