//! Single fixes and the distance-gated background stream.
//!
//! The background stream is registered with the positioning capability under a
//! stable task name, so the platform keeps sampling while the UI is idle. Raw fixes
//! flow through a worker task that drops transient failures and applies the
//! distance gate before handing readings to the caller's sink.

use crate::domain::geo::reading_distance;
use crate::domain::{Accuracy, DomainError, Reading, StreamConfig, StreamHandle};
use crate::ports::LocationProvider;
use crate::usecases::PermissionGate;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Buffer between the platform callback and the gating worker.
const FIX_CHANNEL_CAPACITY: usize = 64;

/// Emits a reading only once it is at least `min_distance_meters` away from the
/// last emitted one. The first reading always passes.
#[derive(Debug, Clone)]
pub struct DistanceGate {
    min_distance_meters: f64,
    last_emitted: Option<Reading>,
}

impl DistanceGate {
    pub fn new(min_distance_meters: f64) -> Self {
        Self {
            min_distance_meters,
            last_emitted: None,
        }
    }

    /// Returns true (and remembers `reading`) when it should be emitted.
    pub fn admit(&mut self, reading: &Reading) -> bool {
        let pass = match &self.last_emitted {
            None => true,
            Some(last) => reading_distance(last, reading) >= self.min_distance_meters,
        };
        if pass {
            self.last_emitted = Some(*reading);
        }
        pass
    }
}

struct ActiveStream {
    task_name: String,
    worker: JoinHandle<()>,
}

pub struct PositionSource {
    provider: Arc<dyn LocationProvider>,
    gate: Arc<PermissionGate>,
    task_name: String,
    accuracy: Accuracy,
    next_id: AtomicU64,
    streams: Mutex<HashMap<u64, ActiveStream>>,
}

impl PositionSource {
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        gate: Arc<PermissionGate>,
        task_name: impl Into<String>,
        accuracy: Accuracy,
    ) -> Self {
        Self {
            provider,
            gate,
            task_name: task_name.into(),
            accuracy,
            next_id: AtomicU64::new(1),
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// One fix. Waits as long as the capability does.
    pub async fn get_current(&self) -> Result<Reading, DomainError> {
        if !self.gate.can_locate().await {
            return Err(DomainError::PermissionDenied(
                "foreground location not granted".to_string(),
            ));
        }
        match self.provider.current_fix(self.accuracy).await {
            Ok(reading) => {
                debug!(%reading, "fix resolved");
                Ok(reading)
            }
            Err(e @ DomainError::PositionUnavailable(_)) => Err(e),
            Err(e) => Err(DomainError::PositionUnavailable(e.to_string())),
        }
    }

    /// Register background sampling and forward gated readings into `sink`.
    ///
    /// Any stream already registered under the same task name is stopped first.
    pub async fn start_background_stream(
        &self,
        config: StreamConfig,
        sink: mpsc::Sender<Reading>,
    ) -> Result<StreamHandle, DomainError> {
        if !self.gate.can_track_in_background().await {
            return Err(DomainError::PermissionDenied(
                "background location not granted".to_string(),
            ));
        }
        if !config.min_distance_meters.is_finite() || config.min_distance_meters < 0.0 {
            return Err(DomainError::ConfigurationInvalid(format!(
                "min distance must be a non-negative number of meters, got {}",
                config.min_distance_meters
            )));
        }

        let mut streams = self.streams.lock().await;
        let stale: Vec<u64> = streams
            .iter()
            .filter(|(_, s)| s.task_name == self.task_name)
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            if let Some(old) = streams.remove(&id) {
                debug!(stream_id = id, task = %old.task_name, "replacing background stream");
                old.worker.abort();
            }
        }

        let (fix_tx, fix_rx) = mpsc::channel(FIX_CHANNEL_CAPACITY);
        self.provider
            .start_updates(&self.task_name, config, fix_tx)
            .await?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let worker = tokio::spawn(run_stream(
            fix_rx,
            sink,
            DistanceGate::new(config.min_distance_meters),
            self.task_name.clone(),
        ));
        streams.insert(
            id,
            ActiveStream {
                task_name: self.task_name.clone(),
                worker,
            },
        );
        info!(
            stream_id = id,
            task = %self.task_name,
            min_distance_m = config.min_distance_meters,
            accuracy = ?config.desired_accuracy,
            "background stream started"
        );

        Ok(StreamHandle {
            id,
            task_name: self.task_name.clone(),
        })
    }

    /// Halt emission. Unknown or already-stopped handles are a no-op.
    pub async fn stop(&self, handle: &StreamHandle) {
        let Some(stream) = self.streams.lock().await.remove(&handle.id) else {
            debug!(stream_id = handle.id, "stop: stream not active");
            return;
        };
        stream.worker.abort();
        if let Err(e) = self.provider.stop_updates(&stream.task_name).await {
            warn!(task = %stream.task_name, error = %e, "failed to unregister background task");
        }
        info!(stream_id = handle.id, task = %stream.task_name, "background stream stopped");
    }
}

async fn run_stream(
    mut fixes: mpsc::Receiver<Result<Reading, DomainError>>,
    sink: mpsc::Sender<Reading>,
    mut gate: DistanceGate,
    task_name: String,
) {
    while let Some(fix) = fixes.recv().await {
        match fix {
            Ok(reading) => {
                if !gate.admit(&reading) {
                    trace!(task = %task_name, %reading, "below distance gate");
                    continue;
                }
                if sink.send(reading).await.is_err() {
                    debug!(task = %task_name, "reading sink closed");
                    break;
                }
            }
            Err(e) => {
                warn!(task = %task_name, error = %e, "transient fix failure; waiting for next tick");
            }
        }
    }
    info!(task = %task_name, "background stream ended");
}
