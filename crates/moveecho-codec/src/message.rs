//! The location message exchanged over the broker

use moveecho_core::types::{ClientId, LocationSample, TransportTag};
use serde::Serialize;
use std::fmt;

/// One position report from one client.
///
/// This is the only message shape on the wire. Field order in the encoded
/// form follows declaration order: `clientId, lat, lng, type, timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationMessage {
    /// Identity of the publishing instance
    #[serde(rename = "clientId")]
    pub client_id: ClientId,
    /// Latitude in decimal degrees (-90 to 90)
    pub lat: f64,
    /// Longitude in decimal degrees (-180 to 180)
    pub lng: f64,
    /// Mode of movement
    #[serde(rename = "type")]
    pub transport: TransportTag,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl LocationMessage {
    /// Builds a message from a sample and its tag.
    pub fn new(client_id: ClientId, sample: &LocationSample, transport: TransportTag) -> Self {
        Self {
            client_id,
            lat: sample.latitude,
            lng: sample.longitude,
            transport,
            timestamp: sample.timestamp,
        }
    }

    /// The position carried by this message.
    pub fn sample(&self) -> LocationSample {
        LocationSample::new(self.lat, self.lng, self.timestamp)
    }
}

impl fmt::Display for LocationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {:.6},{:.6} @{}",
            self.client_id, self.transport, self.lat, self.lng, self.timestamp
        )
    }
}
