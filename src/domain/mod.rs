//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;
pub mod geo;

pub use entities::{
    Accuracy, Capability, DeliveryOutcome, EndpointConfig, LocationPayload, PermissionState,
    PermissionStatus, Reading, StreamConfig, StreamHandle, DEFAULT_BACKGROUND_TASK,
    DEFAULT_MIN_DISTANCE_METERS,
};
pub use errors::DomainError;
