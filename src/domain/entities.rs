//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/platform types here — adapters map into these.

use crate::domain::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default background task name registered with the positioning capability.
pub const DEFAULT_BACKGROUND_TASK: &str = "location-task";

/// Default distance gate for background emission, in meters.
pub const DEFAULT_MIN_DISTANCE_METERS: f64 = 10.0;

/// One timestamped geographic coordinate sample. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    latitude: f64,
    longitude: f64,
    captured_at_epoch_ms: i64,
}

impl Reading {
    /// Build a reading, rejecting out-of-range coordinates and non-positive timestamps.
    pub fn new(latitude: f64, longitude: f64, captured_at_epoch_ms: i64) -> Result<Self, DomainError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(DomainError::InvalidReading(format!(
                "latitude {} out of range [-90, 90]",
                latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(DomainError::InvalidReading(format!(
                "longitude {} out of range [-180, 180]",
                longitude
            )));
        }
        if captured_at_epoch_ms <= 0 {
            return Err(DomainError::InvalidReading(format!(
                "timestamp {} must be positive",
                captured_at_epoch_ms
            )));
        }
        Ok(Self {
            latitude,
            longitude,
            captured_at_epoch_ms,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn captured_at_epoch_ms(&self) -> i64 {
        self.captured_at_epoch_ms
    }

    /// Wire representation sent to the endpoint.
    pub fn to_payload(&self) -> LocationPayload {
        LocationPayload {
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: self.captured_at_epoch_ms,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// JSON body of the outbound POST: `{"latitude", "longitude", "timestamp"}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationPayload {
    pub latitude: f64,
    pub longitude: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// Remote endpoint the readings are posted to. Empty url = unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim().to_string(),
        }
    }

    pub fn is_set(&self) -> bool {
        !self.url.is_empty()
    }
}

/// Result of one delivery (after retries).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Success,
    Failure(String),
}

impl DeliveryOutcome {
    /// User-facing text shown in notifications and the UI.
    pub fn message(&self) -> String {
        match self {
            DeliveryOutcome::Success => "Location sent to server".to_string(),
            DeliveryOutcome::Failure(reason) => format!("Failed to send location: {}", reason),
        }
    }
}

/// Consent state of a single capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    #[default]
    Undetermined,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == PermissionStatus::Granted
    }
}

/// Capabilities the agent asks consent for, in request order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ForegroundLocation,
    BackgroundLocation,
    Notifications,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::ForegroundLocation,
        Capability::BackgroundLocation,
        Capability::Notifications,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::ForegroundLocation => "foreground location",
            Capability::BackgroundLocation => "background location",
            Capability::Notifications => "notifications",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionState {
    pub foreground_location: PermissionStatus,
    pub background_location: PermissionStatus,
    pub notifications: PermissionStatus,
}

impl PermissionState {
    pub fn get(&self, capability: Capability) -> PermissionStatus {
        match capability {
            Capability::ForegroundLocation => self.foreground_location,
            Capability::BackgroundLocation => self.background_location,
            Capability::Notifications => self.notifications,
        }
    }

    pub fn set(&mut self, capability: Capability, status: PermissionStatus) {
        match capability {
            Capability::ForegroundLocation => self.foreground_location = status,
            Capability::BackgroundLocation => self.background_location = status,
            Capability::Notifications => self.notifications = status,
        }
    }

    /// Background sampling needs both location grants.
    pub fn location_fully_granted(&self) -> bool {
        self.foreground_location.is_granted() && self.background_location.is_granted()
    }
}

/// Requested fix accuracy, passed through to the positioning capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    Low,
    Balanced,
    #[default]
    High,
    Highest,
}

impl std::str::FromStr for Accuracy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Accuracy::Low),
            "balanced" => Ok(Accuracy::Balanced),
            "high" => Ok(Accuracy::High),
            "highest" => Ok(Accuracy::Highest),
            other => Err(DomainError::ConfigurationInvalid(format!(
                "unknown accuracy '{}'",
                other
            ))),
        }
    }
}

/// Options for a background stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    pub min_distance_meters: f64,
    pub desired_accuracy: Accuracy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            min_distance_meters: DEFAULT_MIN_DISTANCE_METERS,
            desired_accuracy: Accuracy::High,
        }
    }
}

/// Opaque handle to a running background stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamHandle {
    pub(crate) id: u64,
    pub(crate) task_name: String,
}

impl StreamHandle {
    pub fn task_name(&self) -> &str {
        &self.task_name
    }
}
