//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    /// Caught before any I/O (e.g. empty endpoint, no reading yet).
    #[error("Invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// Network-level failure talking to the endpoint. Carries the bare reason.
    #[error("{0}")]
    Transport(String),

    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("UI error: {0}")]
    Ui(String),
}

impl DomainError {
    /// Short title for user-visible alerts.
    pub fn title(&self) -> &'static str {
        match self {
            DomainError::PermissionDenied(_) => "Permission required",
            DomainError::PositionUnavailable(_) => "Location Not Available",
            DomainError::Transport(_) => "Delivery failed",
            _ => "Error",
        }
    }
}
