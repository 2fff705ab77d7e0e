//! Simulated positioning capability. Implements LocationProvider by replaying a track.
//!
//! Positions come from a CSV file (`latitude,longitude` header) or a single fixed
//! point. Each background tick advances one point and holds at the last one, like a
//! device that stopped moving. Fixes are stamped with wall-clock time.

use crate::domain::{Accuracy, DomainError, Reading, StreamConfig};
use crate::ports::{FixSender, LocationProvider};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct TrackPoint {
    latitude: f64,
    longitude: f64,
}

pub struct ReplayLocationProvider {
    track: Arc<Vec<(f64, f64)>>,
    cursor: Arc<AtomicUsize>,
    interval: Duration,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl ReplayLocationProvider {
    /// Stationary device at `(latitude, longitude)`.
    pub fn fixed(latitude: f64, longitude: f64, interval: Duration) -> Result<Self, DomainError> {
        Self::from_track(vec![(latitude, longitude)], interval)
    }

    pub fn from_track(track: Vec<(f64, f64)>, interval: Duration) -> Result<Self, DomainError> {
        if interval.is_zero() {
            return Err(DomainError::ConfigurationInvalid(
                "sample interval must be greater than zero".to_string(),
            ));
        }
        if track.is_empty() {
            return Err(DomainError::ConfigurationInvalid(
                "track has no points".to_string(),
            ));
        }
        for &(lat, lon) in &track {
            Reading::new(lat, lon, 1)?;
        }
        Ok(Self {
            track: Arc::new(track),
            cursor: Arc::new(AtomicUsize::new(0)),
            interval,
            tasks: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_csv_path(path: impl AsRef<Path>, interval: Duration) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            DomainError::ConfigurationInvalid(format!("open track {}: {}", path.display(), e))
        })?;
        let provider = Self::from_csv_reader(file, interval)?;
        info!(path = %path.display(), points = provider.track.len(), "track loaded");
        Ok(provider)
    }

    pub fn from_csv_reader<R: Read>(reader: R, interval: Duration) -> Result<Self, DomainError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut track = Vec::new();
        for (i, row) in rdr.deserialize::<TrackPoint>().enumerate() {
            let point = row.map_err(|e| {
                DomainError::ConfigurationInvalid(format!("track row {}: {}", i + 1, e))
            })?;
            track.push((point.latitude, point.longitude));
        }
        Self::from_track(track, interval)
    }

    pub fn len(&self) -> usize {
        self.track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track.is_empty()
    }
}

/// Fix at `cursor`, stamped now.
fn fix_at(track: &[(f64, f64)], cursor: usize) -> Result<Reading, DomainError> {
    let (lat, lon) = track
        .get(cursor.min(track.len().saturating_sub(1)))
        .copied()
        .ok_or_else(|| DomainError::PositionUnavailable("empty track".to_string()))?;
    Reading::new(lat, lon, Utc::now().timestamp_millis())
        .map_err(|e| DomainError::PositionUnavailable(e.to_string()))
}

#[async_trait::async_trait]
impl LocationProvider for ReplayLocationProvider {
    async fn current_fix(&self, accuracy: Accuracy) -> Result<Reading, DomainError> {
        let cursor = self.cursor.load(Ordering::SeqCst);
        debug!(cursor, ?accuracy, "replay fix");
        fix_at(&self.track, cursor)
    }

    async fn start_updates(
        &self,
        task_name: &str,
        config: StreamConfig,
        tx: FixSender,
    ) -> Result<(), DomainError> {
        let track = Arc::clone(&self.track);
        let cursor = Arc::clone(&self.cursor);
        let interval = self.interval;
        let name = task_name.to_string();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let at = cursor.load(Ordering::SeqCst);
                if at + 1 < track.len() {
                    cursor.store(at + 1, Ordering::SeqCst);
                }
                if tx.send(fix_at(&track, at)).await.is_err() {
                    debug!(task = %name, "fix receiver dropped");
                    break;
                }
            }
        });

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|e| DomainError::PositionUnavailable(e.to_string()))?;
        if let Some(previous) = tasks.insert(task_name.to_string(), task) {
            previous.abort();
        }
        info!(
            task = task_name,
            interval_ms = self.interval.as_millis() as u64,
            min_distance_m = config.min_distance_meters,
            "replay updates registered"
        );
        Ok(())
    }

    async fn stop_updates(&self, task_name: &str) -> Result<(), DomainError> {
        let removed = self
            .tasks
            .lock()
            .map_err(|e| DomainError::PositionUnavailable(e.to_string()))?
            .remove(task_name);
        if let Some(task) = removed {
            task.abort();
            info!(task = task_name, "replay updates unregistered");
        }
        Ok(())
    }
}

impl Drop for ReplayLocationProvider {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for (_, task) in tasks.drain() {
                task.abort();
            }
        }
    }
}
