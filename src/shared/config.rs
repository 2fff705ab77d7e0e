//! Application configuration. Endpoint, sampling, delivery tuning, paths.

use crate::domain::{Accuracy, DEFAULT_BACKGROUND_TASK, DEFAULT_MIN_DISTANCE_METERS, StreamConfig};
use crate::usecases::{RetryPolicy, StatusPolicy};
use crate::usecases::delivery_queue::DEFAULT_MAX_IN_FLIGHT;
use serde::Deserialize;
use std::time::Duration;

/// Default interval between simulated background fixes.
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Endpoint URL. Overrides the saved setting when present. Read from GEO_RELAY_ENDPOINT_URL.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Sampling
    // ─────────────────────────────────────────────────────────────────────────
    /// Distance gate for background emission (default 10 m).
    #[serde(default)]
    pub min_distance_meters: Option<f64>,

    /// One of low, balanced, high, highest (default high).
    #[serde(default)]
    pub accuracy: Option<String>,

    /// Tick between background fixes of the simulated provider, in ms (default 1000).
    #[serde(default)]
    pub sample_interval_ms: Option<u64>,

    /// Stable name the background task is registered under (default "location-task").
    #[serde(default)]
    pub background_task_name: Option<String>,

    /// CSV track (`latitude,longitude`) replayed by the simulated provider.
    #[serde(default)]
    pub track_file: Option<String>,

    /// Fixed position used when no track file is given.
    #[serde(default)]
    pub fixed_latitude: Option<f64>,

    #[serde(default)]
    pub fixed_longitude: Option<f64>,

    // ─────────────────────────────────────────────────────────────────────────
    // Delivery
    // ─────────────────────────────────────────────────────────────────────────
    /// Attempts per delivery including the first (default 3).
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Delay before the first retry, in ms (default 1000).
    #[serde(default)]
    pub base_delay_ms: Option<u64>,

    /// Backoff multiplier (default 2).
    #[serde(default)]
    pub backoff_factor: Option<u32>,

    /// Concurrent POSTs allowed (default 4).
    #[serde(default)]
    pub max_in_flight: Option<usize>,

    /// Per-request timeout in seconds (default 15).
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Treat any HTTP response as delivered, regardless of status (default false).
    #[serde(default)]
    pub accept_any_status: Option<bool>,

    // ─────────────────────────────────────────────────────────────────────────
    // Runtime
    // ─────────────────────────────────────────────────────────────────────────
    /// JSON file the endpoint URL is saved to (default ./data/settings.json).
    #[serde(default)]
    pub settings_path: Option<String>,

    /// Grant every capability without prompting.
    #[serde(default)]
    pub auto_grant: Option<bool>,

    /// Run background tracking only, no menu, until Ctrl-C.
    #[serde(default)]
    pub headless: Option<bool>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("GEO_RELAY").try_parsing(true));
        if let Ok(path) = std::env::var("GEO_RELAY_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c.build()?.try_deserialize()
    }

    /// Configured endpoint, if non-blank.
    pub fn endpoint_url(&self) -> Option<String> {
        self.endpoint_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }

    /// Returns the distance gate in meters. Defaults to 10 if unset or invalid.
    pub fn min_distance_meters_or_default(&self) -> f64 {
        self.min_distance_meters
            .filter(|m| m.is_finite() && *m >= 0.0)
            .unwrap_or(DEFAULT_MIN_DISTANCE_METERS)
    }

    /// Returns the fix accuracy. Unknown values fall back to high.
    pub fn accuracy_or_default(&self) -> Accuracy {
        self.accuracy
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            min_distance_meters: self.min_distance_meters_or_default(),
            desired_accuracy: self.accuracy_or_default(),
        }
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(
            self.sample_interval_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_SAMPLE_INTERVAL_MS),
        )
    }

    pub fn background_task_name_or_default(&self) -> String {
        self.background_task_name
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BACKGROUND_TASK.to_string())
    }

    /// Fixed position from config, when both coordinates are given.
    pub fn fixed_position(&self) -> Option<(f64, f64)> {
        self.fixed_latitude.zip(self.fixed_longitude)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            base_delay: self
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            factor: self.backoff_factor.unwrap_or(defaults.factor).max(1),
        }
    }

    pub fn status_policy(&self) -> StatusPolicy {
        if self.accept_any_status.unwrap_or(false) {
            StatusPolicy::AnyResponse
        } else {
            StatusPolicy::RequireSuccess
        }
    }

    pub fn max_in_flight_or_default(&self) -> usize {
        self.max_in_flight
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_IN_FLIGHT)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(15))
    }

    pub fn settings_path_or_default(&self) -> String {
        self.settings_path
            .clone()
            .unwrap_or_else(|| "./data/settings.json".to_string())
    }

    pub fn auto_grant(&self) -> bool {
        self.auto_grant.unwrap_or(false)
    }

    pub fn headless(&self) -> bool {
        self.headless.unwrap_or(false)
    }
}
