//! Outbound location publishing

use crate::metrics::PublisherMetrics;
use moveecho_client::ConnectionManager;
use moveecho_codec::encode;
use moveecho_core::{LocationSample, PublishError, TransportTag};
use std::sync::Arc;
use tracing::debug;

/// Encodes samples under the manager's identity and publishes them on the
/// configured topic. No retry and no queueing: a sample that cannot be sent
/// now is superseded by the next one.
#[derive(Clone)]
pub struct LocationPublisher {
    manager: ConnectionManager,
    metrics: Arc<PublisherMetrics>,
}

impl LocationPublisher {
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            manager,
            metrics: Arc::new(PublisherMetrics::new()),
        }
    }

    pub fn publish(&self, sample: &LocationSample, tag: TransportTag) -> Result<(), PublishError> {
        let payload = encode(self.manager.client_id(), sample, tag).map_err(|e| {
            self.metrics.record_dropped("encode");
            PublishError::Encode {
                reason: e.to_string(),
            }
        })?;

        let config = self.manager.config();
        match self
            .manager
            .publish(&config.topic, payload, config.qos, config.retained)
        {
            Ok(()) => {
                self.metrics.record_published();
                debug!(
                    lat = sample.latitude,
                    lng = sample.longitude,
                    transport = %tag,
                    "Location published"
                );
                Ok(())
            }
            Err(e) => {
                self.metrics.record_dropped(match e {
                    PublishError::NotConnected => "not_connected",
                    PublishError::Backpressure => "backpressure",
                    _ => "transport",
                });
                Err(e)
            }
        }
    }

    pub fn metrics(&self) -> &PublisherMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moveecho_client::{ConnectionState, MemoryBroker};
    use moveecho_codec::decode;
    use moveecho_core::BrokerConfig;

    #[tokio::test(start_paused = true)]
    async fn test_publish_encodes_with_own_identity() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(BrokerConfig::default(), broker.transport());
        let publisher = LocationPublisher::new(manager.clone());

        manager.connect();
        assert!(manager.wait_for_state(ConnectionState::Connected).await);

        let sample = LocationSample::new(37.7749, -122.4194, 1_700_000_000_000);
        publisher.publish(&sample, TransportTag::Truck).unwrap();

        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "moveecho/locations");

        let message = decode(&published[0].payload).unwrap();
        assert_eq!(&message.client_id, manager.client_id());
        assert_eq!(message.sample(), sample);
        assert_eq!(message.transport, TransportTag::Truck);
        assert_eq!(publisher.metrics().published(), 1);

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn test_not_connected_is_reported() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(BrokerConfig::default(), broker.transport());
        let publisher = LocationPublisher::new(manager);

        let sample = LocationSample::new(1.0, 2.0, 3);
        assert_eq!(
            publisher.publish(&sample, TransportTag::Car),
            Err(PublishError::NotConnected)
        );
        assert!(broker.published().is_empty());
        assert_eq!(publisher.metrics().dropped(), 1);
    }

    #[tokio::test]
    async fn test_invalid_sample_is_encode_error() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(BrokerConfig::default(), broker.transport());
        let publisher = LocationPublisher::new(manager);

        let sample = LocationSample::new(95.0, 0.0, 3);
        assert!(matches!(
            publisher.publish(&sample, TransportTag::Car),
            Err(PublishError::Encode { .. })
        ));
    }
}
