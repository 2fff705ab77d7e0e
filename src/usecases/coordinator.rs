//! Owns the endpoint setting and the last fetched reading; wires positions to delivery.
//!
//! State machine: Idle -> LocationFetched -> Sending -> LocationFetched.
//! Every failure stops here and becomes a user-visible message in the snapshot;
//! the UI only reads the projection from `subscribe()`.

use crate::domain::{DeliveryOutcome, DomainError, EndpointConfig, Reading, StreamConfig, StreamHandle};
use crate::ports::SettingsPort;
use crate::usecases::{DeliveryQueue, PermissionGate, PositionSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Readings buffered between the background stream and the forwarder.
const BACKGROUND_BUFFER: usize = 32;

/// Background deliveries the forwarder keeps open before it waits for one to finish.
const MAX_BACKGROUND_DELIVERIES: usize = 16;

pub const MSG_TRACKING_ENDED: &str = "Background tracking ended";

pub const MSG_NO_ENDPOINT: &str = "Please enter a server URL.";
pub const MSG_NO_READING: &str = "Please get the current location first.";
pub const MSG_LOCATION_PERMISSION: &str = "Location permissions are necessary for tracking.";
pub const MSG_NOTIFICATION_PERMISSION: &str =
    "Notification permissions are necessary for push notifications.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    LocationFetched,
    Sending,
}

/// Read-only projection consumed by the UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorSnapshot {
    pub phase: Phase,
    pub endpoint: EndpointConfig,
    pub last_reading: Option<Reading>,
    /// Latest user-visible status or error text.
    pub last_message: Option<String>,
    pub tracking: bool,
}

pub struct Coordinator {
    positions: Arc<PositionSource>,
    queue: Arc<DeliveryQueue>,
    gate: Arc<PermissionGate>,
    settings: Arc<dyn SettingsPort>,
    stream_config: StreamConfig,
    state: watch::Sender<CoordinatorSnapshot>,
    sends_in_flight: AtomicUsize,
    tracking: Arc<Mutex<Option<StreamHandle>>>,
}

impl Coordinator {
    pub fn new(
        positions: Arc<PositionSource>,
        queue: Arc<DeliveryQueue>,
        gate: Arc<PermissionGate>,
        settings: Arc<dyn SettingsPort>,
        stream_config: StreamConfig,
        endpoint: EndpointConfig,
    ) -> Self {
        let (state, _) = watch::channel(CoordinatorSnapshot {
            endpoint,
            ..CoordinatorSnapshot::default()
        });
        Self {
            positions,
            queue,
            gate,
            settings,
            stream_config,
            state,
            sends_in_flight: AtomicUsize::new(0),
            tracking: Arc::new(Mutex::new(None)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.state.borrow().clone()
    }

    /// Update the endpoint (last write wins) and persist it. Persistence failures are logged only.
    pub async fn set_endpoint(&self, url: &str) -> EndpointConfig {
        let endpoint = EndpointConfig::new(url);
        self.state.send_modify(|s| {
            s.endpoint = endpoint.clone();
            s.last_message = Some(if endpoint.is_set() {
                format!("Server URL set to {}", endpoint.url)
            } else {
                "Server URL cleared".to_string()
            });
        });
        if let Err(e) = self.settings.save_endpoint(&endpoint).await {
            warn!(error = %e, "failed to persist endpoint");
        }
        info!(url = %endpoint.url, "endpoint updated");
        endpoint
    }

    /// Resolve a fix and make it the last known reading.
    pub async fn fetch_location(&self) -> Result<Reading, DomainError> {
        match self.positions.get_current().await {
            Ok(reading) => {
                self.state.send_modify(|s| {
                    s.last_reading = Some(reading);
                    s.last_message = Some(format!("Location fetched: {}", reading));
                    s.phase = self.settled_phase(s);
                });
                info!(%reading, "location fetched");
                Ok(reading)
            }
            Err(e) => {
                warn!(error = %e, "fetch location failed");
                self.record_error(&e);
                Err(e)
            }
        }
    }

    /// Send the last fetched reading. Validation failures return `Err` without any I/O;
    /// delivery failures come back as `Ok(DeliveryOutcome::Failure(..))`.
    pub async fn send_current_location(&self) -> Result<DeliveryOutcome, DomainError> {
        let (endpoint, reading) = {
            let s = self.state.borrow();
            (s.endpoint.clone(), s.last_reading)
        };
        let Some(reading) = reading else {
            let e = DomainError::ConfigurationInvalid(MSG_NO_READING.to_string());
            self.record_error(&e);
            return Err(e);
        };
        if !endpoint.is_set() {
            let e = DomainError::ConfigurationInvalid(MSG_NO_ENDPOINT.to_string());
            self.record_error(&e);
            return Err(e);
        }

        self.sends_in_flight.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|s| s.phase = Phase::Sending);
        debug!(%reading, url = %endpoint.url, "sending location");

        let outcome = self.queue.enqueue(reading, &endpoint).await;

        self.sends_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.state.send_modify(|s| {
            s.last_message = Some(outcome.message());
            s.phase = self.settled_phase(s);
        });
        Ok(outcome)
    }

    /// Start background tracking; readings go to the delivery queue as they arrive.
    /// Already tracking: returns the existing handle. A stream that ended on its own
    /// is cleared by its forwarder, so the next call registers a fresh one.
    pub async fn start_tracking(&self) -> Result<StreamHandle, DomainError> {
        let mut tracking = self.tracking.lock().await;
        if let Some(handle) = tracking.as_ref() {
            return Ok(handle.clone());
        }

        let (tx, rx) = mpsc::channel(BACKGROUND_BUFFER);
        let handle = match self
            .positions
            .start_background_stream(self.stream_config, tx)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "background tracking not started");
                match &e {
                    DomainError::PermissionDenied(_) => self.record_message(MSG_LOCATION_PERMISSION),
                    _ => self.record_error(&e),
                }
                return Err(e);
            }
        };

        tokio::spawn(forward_background(
            rx,
            Arc::clone(&self.queue),
            Arc::clone(&self.positions),
            self.state.clone(),
            Arc::clone(&self.tracking),
            handle.clone(),
        ));
        *tracking = Some(handle.clone());
        self.state.send_modify(|s| {
            s.tracking = true;
            s.last_message = Some("Background tracking started".to_string());
        });
        Ok(handle)
    }

    /// Stop background tracking. No-op when not tracking.
    pub async fn stop_tracking(&self) {
        let Some(handle) = self.tracking.lock().await.take() else {
            return;
        };
        self.positions.stop(&handle).await;
        self.state.send_modify(|s| {
            s.tracking = false;
            s.last_message = Some("Background tracking stopped".to_string());
        });
    }

    /// Startup warnings for missing grants, as user-visible text.
    pub async fn permission_warnings(&self) -> Vec<&'static str> {
        let state = self.gate.current().await;
        let mut warnings = Vec::new();
        if !state.location_fully_granted() {
            warnings.push(MSG_LOCATION_PERMISSION);
        }
        if !state.notifications.is_granted() {
            warnings.push(MSG_NOTIFICATION_PERMISSION);
        }
        warnings
    }

    fn settled_phase(&self, s: &CoordinatorSnapshot) -> Phase {
        if self.sends_in_flight.load(Ordering::SeqCst) > 0 {
            Phase::Sending
        } else if s.last_reading.is_some() {
            Phase::LocationFetched
        } else {
            Phase::Idle
        }
    }

    fn record_error(&self, e: &DomainError) {
        self.record_message(&format!("{}: {}", e.title(), e));
    }

    fn record_message(&self, message: &str) {
        self.state
            .send_modify(|s| s.last_message = Some(message.to_string()));
    }
}

/// Hand each background reading to the queue as an independent delivery.
/// The endpoint is read at delivery time so URL edits apply to later readings.
///
/// When the reading channel closes while `handle` is still the tracked stream, the
/// stream ended without `stop_tracking` (e.g. revoked by the platform): release it
/// and clear the tracking flag.
async fn forward_background(
    mut readings: mpsc::Receiver<Reading>,
    queue: Arc<DeliveryQueue>,
    positions: Arc<PositionSource>,
    state: watch::Sender<CoordinatorSnapshot>,
    tracking: Arc<Mutex<Option<StreamHandle>>>,
    handle: StreamHandle,
) {
    let mut deliveries = JoinSet::new();
    while let Some(reading) = readings.recv().await {
        let endpoint = state.borrow().endpoint.clone();
        if !endpoint.is_set() {
            debug!(%reading, "no endpoint configured; background reading dropped");
            continue;
        }
        while deliveries.try_join_next().is_some() {}
        if deliveries.len() >= MAX_BACKGROUND_DELIVERIES {
            debug!(open = deliveries.len(), "background deliveries saturated; waiting");
            deliveries.join_next().await;
        }
        let queue = Arc::clone(&queue);
        deliveries.spawn(async move {
            queue.enqueue(reading, &endpoint).await;
        });
    }

    {
        let mut current = tracking.lock().await;
        if current.as_ref() == Some(&handle) {
            *current = None;
            positions.stop(&handle).await;
            state.send_modify(|s| {
                s.tracking = false;
                s.last_message = Some(MSG_TRACKING_ENDED.to_string());
            });
            warn!(task = handle.task_name(), "background stream ended on its own");
        }
    }

    while deliveries.join_next().await.is_some() {}
    debug!("background forwarder finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{
        MemorySettings, MockTransport, RecordingNotifier, ScriptedConsent,
        ScriptedLocationProvider,
    };
    use crate::domain::geo::meters_to_lat_degrees;
    use crate::domain::{Accuracy, Capability, DEFAULT_BACKGROUND_TASK, LocationPayload};
    use crate::usecases::{NotificationSink, RetryPolicy, StatusPolicy};
    use std::time::Duration;

    const ENDPOINT: &str = "https://example.test/ingest";

    struct Harness {
        coordinator: Arc<Coordinator>,
        transport: Arc<MockTransport>,
        provider: Arc<ScriptedLocationProvider>,
        notifier: Arc<RecordingNotifier>,
        settings: Arc<MemorySettings>,
    }

    async fn harness(consent: ScriptedConsent, transport: MockTransport) -> Harness {
        let gate = Arc::new(PermissionGate::new(Arc::new(consent)));
        gate.request_all().await;
        let provider = Arc::new(ScriptedLocationProvider::with_fix(scenario_reading()));
        let transport = Arc::new(transport);
        let notifier = Arc::new(RecordingNotifier::new());
        let settings = Arc::new(MemorySettings::new());
        let sink = Arc::new(NotificationSink::new(notifier.clone(), Arc::clone(&gate)));
        let queue = Arc::new(DeliveryQueue::new(
            transport.clone(),
            sink,
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::ZERO,
                factor: 2,
            },
            StatusPolicy::RequireSuccess,
            4,
        ));
        let positions = Arc::new(PositionSource::new(
            provider.clone(),
            Arc::clone(&gate),
            DEFAULT_BACKGROUND_TASK,
            Accuracy::High,
        ));
        let coordinator = Arc::new(Coordinator::new(
            positions,
            queue,
            gate,
            settings.clone(),
            StreamConfig::default(),
            EndpointConfig::default(),
        ));
        Harness {
            coordinator,
            transport,
            provider,
            notifier,
            settings,
        }
    }

    fn scenario_reading() -> Reading {
        Reading::new(37.422, -122.084, 1_700_000_000_000).unwrap()
    }

    #[tokio::test]
    async fn fetch_then_send_posts_once_and_round_trips() {
        let h = harness(ScriptedConsent::grant_all(), MockTransport::new()).await;
        h.coordinator.set_endpoint(ENDPOINT).await;

        let reading = h.coordinator.fetch_location().await.unwrap();
        assert_eq!(h.coordinator.snapshot().phase, Phase::LocationFetched);

        let outcome = h.coordinator.send_current_location().await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Success);

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].body,
            r#"{"latitude":37.422,"longitude":-122.084,"timestamp":1700000000000}"#
        );
        let decoded: LocationPayload = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(decoded, reading.to_payload());
    }

    #[tokio::test]
    async fn round_trip_holds_across_coordinate_range() {
        let h = harness(ScriptedConsent::grant_all(), MockTransport::new()).await;
        h.coordinator.set_endpoint(ENDPOINT).await;
        let cases = [
            (90.0, 180.0, 1),
            (-90.0, -180.0, 1_700_000_000_000),
            (0.0, 0.0, 1_700_000_000_000),
            (-0.0, -0.0, 1_700_000_000_000),
            (12.345678901234567, -98.76543210987654, i64::MAX),
            (-33.868_820_1, 151.209_295_5, 4_102_444_800_000),
            (37.422, -122.084, 1_700_000_000_000),
        ];

        for (i, &(lat, lon, ts)) in cases.iter().enumerate() {
            let expected = Reading::new(lat, lon, ts).unwrap();
            h.provider.set_current(Ok(expected));

            let fetched = h.coordinator.fetch_location().await.unwrap();
            let outcome = h.coordinator.send_current_location().await.unwrap();

            assert_eq!(fetched, expected);
            assert_eq!(outcome, DeliveryOutcome::Success);
            let requests = h.transport.requests();
            assert_eq!(requests.len(), i + 1, "one request per send ({lat}, {lon})");
            let decoded: LocationPayload =
                serde_json::from_str(&requests[i].body).unwrap();
            assert_eq!(decoded, expected.to_payload(), "body {}", requests[i].body);
            assert_eq!(decoded.latitude.to_bits(), lat.to_bits());
            assert_eq!(decoded.longitude.to_bits(), lon.to_bits());
        }
    }

    #[tokio::test]
    async fn send_passes_through_sending_phase() {
        let h = harness(
            ScriptedConsent::grant_all(),
            MockTransport::new().with_delay(Duration::from_millis(50)),
        )
        .await;
        h.coordinator.set_endpoint(ENDPOINT).await;
        h.coordinator.fetch_location().await.unwrap();

        let mut rx = h.coordinator.subscribe();
        let coordinator = Arc::clone(&h.coordinator);
        let send = tokio::spawn(async move { coordinator.send_current_location().await });

        rx.wait_for(|s| s.phase == Phase::Sending).await.unwrap();
        let outcome = send.await.unwrap().unwrap();

        assert_eq!(outcome, DeliveryOutcome::Success);
        let snapshot = h.coordinator.snapshot();
        assert_eq!(snapshot.phase, Phase::LocationFetched);
        assert_eq!(snapshot.last_message.as_deref(), Some("Location sent to server"));
    }

    #[tokio::test]
    async fn send_with_empty_endpoint_is_rejected_without_io() {
        let h = harness(ScriptedConsent::grant_all(), MockTransport::new()).await;
        h.coordinator.fetch_location().await.unwrap();

        let result = h.coordinator.send_current_location().await;

        assert!(matches!(result, Err(DomainError::ConfigurationInvalid(_))));
        assert_eq!(h.transport.request_count(), 0);
        let snapshot = h.coordinator.snapshot();
        assert_eq!(snapshot.phase, Phase::LocationFetched);
        assert!(snapshot.last_message.unwrap().contains(MSG_NO_ENDPOINT));
    }

    #[tokio::test]
    async fn send_without_fetch_is_rejected_without_io() {
        let h = harness(ScriptedConsent::grant_all(), MockTransport::new()).await;
        h.coordinator.set_endpoint(ENDPOINT).await;

        let result = h.coordinator.send_current_location().await;

        assert!(matches!(result, Err(DomainError::ConfigurationInvalid(_))));
        assert_eq!(h.transport.request_count(), 0);
        assert_eq!(h.coordinator.snapshot().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn network_error_returns_to_location_fetched() {
        let h = harness(
            ScriptedConsent::grant_all(),
            MockTransport::failing("network error", 3),
        )
        .await;
        h.coordinator.set_endpoint(ENDPOINT).await;
        h.coordinator.fetch_location().await.unwrap();

        let outcome = h.coordinator.send_current_location().await.unwrap();

        assert_eq!(outcome, DeliveryOutcome::Failure("network error".to_string()));
        assert_eq!(h.coordinator.snapshot().phase, Phase::LocationFetched);
    }

    #[tokio::test]
    async fn fetch_failure_is_reported_and_state_kept() {
        let h = harness(ScriptedConsent::grant_all(), MockTransport::new()).await;
        h.provider
            .set_current(Err(DomainError::PositionUnavailable("no signal".into())));

        let result = h.coordinator.fetch_location().await;

        assert!(matches!(result, Err(DomainError::PositionUnavailable(_))));
        let snapshot = h.coordinator.snapshot();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert!(snapshot.last_message.unwrap().contains("no signal"));
    }

    #[tokio::test]
    async fn endpoint_is_trimmed_and_persisted() {
        let h = harness(ScriptedConsent::grant_all(), MockTransport::new()).await;

        let endpoint = h.coordinator.set_endpoint("  https://example.test/x  ").await;

        assert_eq!(endpoint.url, "https://example.test/x");
        assert_eq!(h.settings.stored(), Some(endpoint.clone()));
        assert_eq!(h.coordinator.snapshot().endpoint, endpoint);
    }

    #[tokio::test]
    async fn background_readings_are_delivered() {
        let h = harness(ScriptedConsent::grant_all(), MockTransport::new()).await;
        h.coordinator.set_endpoint(ENDPOINT).await;

        let handle = h.coordinator.start_tracking().await.unwrap();
        assert!(h.coordinator.snapshot().tracking);
        // Second start is idempotent.
        assert_eq!(h.coordinator.start_tracking().await.unwrap(), handle);
        assert_eq!(h.provider.start_count(), 1);

        h.provider
            .push(DEFAULT_BACKGROUND_TASK, Ok(scenario_reading()))
            .await;

        for _ in 0..100 {
            if h.transport.request_count() == 1 && !h.notifier.bodies().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.transport.request_count(), 1);
        assert_eq!(h.notifier.bodies(), vec!["Location sent to server".to_string()]);
        // Background readings do not replace the manually fetched one.
        assert_eq!(h.coordinator.snapshot().last_reading, None);

        h.coordinator.stop_tracking().await;
        h.coordinator.stop_tracking().await;
        assert!(!h.coordinator.snapshot().tracking);
        assert_eq!(h.provider.stop_count(), 1);
    }

    #[tokio::test]
    async fn stream_ended_by_platform_can_be_restarted() {
        let h = harness(ScriptedConsent::grant_all(), MockTransport::new()).await;
        h.coordinator.set_endpoint(ENDPOINT).await;
        let mut rx = h.coordinator.subscribe();

        let first = h.coordinator.start_tracking().await.unwrap();
        h.provider.revoke(DEFAULT_BACKGROUND_TASK);

        let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| !s.tracking))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(snapshot.last_message.as_deref(), Some(MSG_TRACKING_ENDED));

        let second = h.coordinator.start_tracking().await.unwrap();
        assert_ne!(first, second);
        assert_eq!(h.provider.start_count(), 2);
        assert!(h.coordinator.snapshot().tracking);
        assert!(h.provider.is_registered(DEFAULT_BACKGROUND_TASK));

        assert!(
            h.provider
                .push(DEFAULT_BACKGROUND_TASK, Ok(scenario_reading()))
                .await
        );
        for _ in 0..100 {
            if h.transport.request_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.transport.request_count(), 1);

        h.coordinator.stop_tracking().await;
        assert!(!h.coordinator.snapshot().tracking);
    }

    #[tokio::test]
    async fn background_burst_is_fully_delivered() {
        let h = harness(
            ScriptedConsent::grant_all(),
            MockTransport::new().with_delay(Duration::from_millis(20)),
        )
        .await;
        h.coordinator.set_endpoint(ENDPOINT).await;
        h.coordinator.start_tracking().await.unwrap();

        let burst = 3 * MAX_BACKGROUND_DELIVERIES;
        for i in 0..burst {
            let lat = 37.0 + meters_to_lat_degrees(20.0 * i as f64);
            let reading = Reading::new(lat, -122.084, 1_700_000_000_000 + i as i64).unwrap();
            assert!(h.provider.push(DEFAULT_BACKGROUND_TASK, Ok(reading)).await);
        }

        for _ in 0..300 {
            if h.transport.request_count() == burst {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.transport.request_count(), burst);
        assert!(h.coordinator.snapshot().tracking);
        h.coordinator.stop_tracking().await;
    }

    #[tokio::test]
    async fn tracking_refused_without_background_permission() {
        let h = harness(
            ScriptedConsent::grant_all().deny(Capability::BackgroundLocation),
            MockTransport::new(),
        )
        .await;

        let result = h.coordinator.start_tracking().await;

        assert!(matches!(result, Err(DomainError::PermissionDenied(_))));
        let snapshot = h.coordinator.snapshot();
        assert!(!snapshot.tracking);
        assert_eq!(snapshot.last_message.as_deref(), Some(MSG_LOCATION_PERMISSION));
        assert_eq!(
            h.coordinator.permission_warnings().await,
            vec![MSG_LOCATION_PERMISSION]
        );
    }
}
