//! Tracking session lifecycle
//!
//! `start()` brings up the whole pipeline: foreground host, broker
//! connection, shared-topic subscription, location updates and the pump
//! task that publishes every sample. `stop()` tears it down in reverse.
//! Location permission must be granted before `start()`.

use crate::error::{Result, TrackingError};
use crate::host::{ForegroundHost, NotificationSpec};
use crate::preferences::PreferenceStore;
use crate::provider::{LocationProvider, LocationRequest, SampleStream};
use crate::publisher::LocationPublisher;
use crate::router::LocationRouter;
use futures::StreamExt;
use moveecho_client::ConnectionManager;
use moveecho_core::PublishError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

struct Pump {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct TrackingSession {
    manager: ConnectionManager,
    router: Arc<LocationRouter>,
    publisher: LocationPublisher,
    provider: Arc<dyn LocationProvider>,
    preferences: Arc<dyn PreferenceStore>,
    host: Arc<dyn ForegroundHost>,
    request: LocationRequest,
    notification: NotificationSpec,
    pump: Mutex<Option<Pump>>,
    running: AtomicBool,
}

impl TrackingSession {
    /// Wires a session around `manager` and installs a [`LocationRouter`]
    /// as the manager's message handler.
    pub fn new(
        manager: ConnectionManager,
        provider: Arc<dyn LocationProvider>,
        preferences: Arc<dyn PreferenceStore>,
        host: Arc<dyn ForegroundHost>,
    ) -> Self {
        let router = Arc::new(LocationRouter::new(manager.client_id().clone()));
        manager.set_message_handler(router.clone());

        Self {
            publisher: LocationPublisher::new(manager.clone()),
            manager,
            router,
            provider,
            preferences,
            host,
            request: LocationRequest::default(),
            notification: NotificationSpec::default(),
            pump: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_request(mut self, request: LocationRequest) -> Self {
        self.request = request;
        self
    }

    pub fn with_notification(mut self, notification: NotificationSpec) -> Self {
        self.notification = notification;
        self
    }

    /// Starts tracking. Does nothing if already running.
    ///
    /// Fails only if the foreground host or the location provider refuses;
    /// in that case everything started so far is rolled back. Broker
    /// problems are not errors here: the connection keeps retrying in the
    /// background and samples are dropped until it is up.
    pub async fn start(&self) -> Result<()> {
        let mut pump = self.pump.lock().await;
        if pump.is_some() {
            debug!("Tracking session already running");
            return Ok(());
        }

        self.host.enter_foreground(&self.notification)?;
        self.manager.connect();

        let topic = self.manager.config().topic.clone();
        if let Err(e) = self.manager.subscribe(&topic).await {
            // Recorded anyway; reissued on the next connection
            warn!(topic = %topic, error = %e, "Subscribe failed");
        }

        let samples = match self.provider.subscribe(self.request).await {
            Ok(samples) => samples,
            Err(e) => {
                error!(error = %e, "Location updates unavailable, aborting session start");
                self.manager.disconnect().await;
                self.host.exit_foreground();
                return Err(TrackingError::from(e));
            }
        };

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_pump(
            samples,
            self.publisher.clone(),
            self.preferences.clone(),
            cancel.clone(),
        ));
        *pump = Some(Pump { cancel, task });
        self.running.store(true, Ordering::SeqCst);

        info!(
            client_id = %self.manager.client_id(),
            interval_ms = self.request.interval.as_millis() as u64,
            "Tracking session started"
        );
        Ok(())
    }

    /// Stops tracking. Does nothing if not running.
    pub async fn stop(&self) {
        let mut pump = self.pump.lock().await;
        let Some(Pump { cancel, task }) = pump.take() else {
            debug!("Tracking session not running");
            return;
        };

        cancel.cancel();
        if let Err(e) = task.await {
            if e.is_panic() {
                error!(error = %e, "Location pump panicked");
            }
        }

        if let Err(e) = self.provider.unsubscribe().await {
            warn!(error = %e, "Failed to stop location updates");
        }

        self.manager.disconnect().await;
        self.host.exit_foreground();
        self.running.store(false, Ordering::SeqCst);

        info!("Tracking session stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn router(&self) -> &Arc<LocationRouter> {
        &self.router
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn publisher(&self) -> &LocationPublisher {
        &self.publisher
    }
}

async fn run_pump(
    mut samples: SampleStream,
    publisher: LocationPublisher,
    preferences: Arc<dyn PreferenceStore>,
    cancel: CancellationToken,
) {
    loop {
        let sample = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = samples.next() => match next {
                Some(sample) => sample,
                None => {
                    debug!("Location stream ended");
                    break;
                }
            },
        };

        let tag = preferences.transport_tag();
        match publisher.publish(&sample, tag) {
            Ok(()) => {}
            Err(PublishError::NotConnected) => {
                debug!("Not connected, location sample dropped");
            }
            Err(e) => warn!(error = %e, "Failed to publish location"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::host::LoggingHost;
    use crate::preferences::MemoryPreferences;
    use crate::provider::ChannelProvider;
    use async_trait::async_trait;
    use moveecho_client::{ConnectionState, MemoryBroker};
    use moveecho_codec::decode;
    use moveecho_core::{BrokerConfig, LocationSample, TransportTag};
    use std::time::Duration;

    struct Fixture {
        broker: MemoryBroker,
        provider: Arc<ChannelProvider>,
        preferences: Arc<MemoryPreferences>,
        host: Arc<LoggingHost>,
        session: TrackingSession,
    }

    fn fixture() -> Fixture {
        let broker = MemoryBroker::new();
        let provider = Arc::new(ChannelProvider::new());
        let preferences = Arc::new(MemoryPreferences::default());
        let host = Arc::new(LoggingHost::new());
        let manager = ConnectionManager::new(BrokerConfig::default(), broker.transport());
        let session = TrackingSession::new(
            manager,
            provider.clone(),
            preferences.clone(),
            host.clone(),
        );

        Fixture {
            broker,
            provider,
            preferences,
            host,
            session,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_published_with_current_tag() {
        let f = fixture();
        f.session.start().await.unwrap();
        settle().await;

        assert!(f.session.is_running());
        assert!(f.host.is_foreground());
        assert_eq!(f.session.manager().state(), ConnectionState::Connected);
        assert_eq!(
            f.broker.subscriptions(f.session.manager().client_id()),
            vec!["moveecho/locations"]
        );

        assert!(f.provider.push(LocationSample::new(1.0, 2.0, 100)));
        settle().await;
        f.preferences.set_transport_tag(TransportTag::Bike).unwrap();
        assert!(f.provider.push(LocationSample::new(1.5, 2.5, 200)));
        settle().await;

        let published = f.broker.published();
        assert_eq!(published.len(), 2);
        let first = decode(&published[0].payload).unwrap();
        let second = decode(&published[1].payload).unwrap();
        assert_eq!(first.transport, TransportTag::Car);
        assert_eq!(second.transport, TransportTag::Bike);
        assert_eq!(second.sample(), LocationSample::new(1.5, 2.5, 200));

        f.session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_samples_not_surfaced() {
        let f = fixture();
        let seen = Arc::new(parking_lot::Mutex::new(0));
        let sink = seen.clone();
        f.session
            .router()
            .add_observer(move |_: &moveecho_codec::LocationMessage| -> anyhow::Result<()> {
                *sink.lock() += 1;
                Ok(())
            });

        f.session.start().await.unwrap();
        settle().await;
        f.provider.push(LocationSample::new(1.0, 2.0, 100));
        settle().await;

        assert_eq!(f.broker.published().len(), 1);
        assert_eq!(*seen.lock(), 0);
        assert_eq!(f.session.router().stats().self_echo_dropped, 1);
        f.session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_noop() {
        let f = fixture();
        f.session.start().await.unwrap();
        // A second provider subscription would fail with AlreadySubscribed
        f.session.start().await.unwrap();
        settle().await;

        assert_eq!(f.broker.connect_attempts(), 1);
        f.session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_tears_everything_down() {
        let f = fixture();
        f.session.start().await.unwrap();
        settle().await;

        f.session.stop().await;

        assert!(!f.session.is_running());
        assert!(!f.host.is_foreground());
        assert!(!f.provider.is_subscribed());
        assert_eq!(f.session.manager().state(), ConnectionState::Disconnected);
        assert_eq!(f.broker.session_count(), 0);

        // Second stop is a no-op
        f.session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_retry_wait_cancels_attempt() {
        let f = fixture();
        f.broker.set_offline(true);

        f.session.start().await.unwrap();
        settle().await;
        assert_eq!(f.session.manager().state(), ConnectionState::Reconnecting);

        f.session.stop().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(f.broker.connect_attempts(), 1);
        assert_eq!(f.session.manager().state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_dropped_while_offline() {
        let f = fixture();
        f.broker.set_offline(true);
        f.session.start().await.unwrap();
        settle().await;

        f.provider.push(LocationSample::new(1.0, 2.0, 100));
        settle().await;
        assert!(f.broker.published().is_empty());
        assert_eq!(f.session.publisher().metrics().dropped(), 1);

        f.broker.set_offline(false);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(f.session.manager().state(), ConnectionState::Connected);

        f.provider.push(LocationSample::new(1.0, 2.0, 200));
        settle().await;
        assert_eq!(f.broker.published().len(), 1);
        f.session.stop().await;
    }

    struct DeniedProvider;

    #[async_trait]
    impl LocationProvider for DeniedProvider {
        async fn subscribe(&self, _request: LocationRequest) -> std::result::Result<SampleStream, ProviderError> {
            Err(ProviderError::PermissionDenied)
        }

        async fn unsubscribe(&self) -> std::result::Result<(), ProviderError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_failure_rolls_back() {
        let broker = MemoryBroker::new();
        let host = Arc::new(LoggingHost::new());
        let manager = ConnectionManager::new(BrokerConfig::default(), broker.transport());
        let session = TrackingSession::new(
            manager,
            Arc::new(DeniedProvider),
            Arc::new(MemoryPreferences::default()),
            host.clone(),
        );

        let result = session.start().await;
        assert!(matches!(
            result,
            Err(TrackingError::Provider(ProviderError::PermissionDenied))
        ));
        assert!(!session.is_running());
        assert!(!host.is_foreground());
        assert_eq!(session.manager().state(), ConnectionState::Disconnected);
    }
}
