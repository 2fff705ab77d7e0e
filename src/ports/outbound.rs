//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters. Platform capabilities (positioning, notifications,
//! consent dialogs) are injected through these so use cases can run against
//! deterministic doubles.

use crate::domain::{
    Accuracy, Capability, DomainError, EndpointConfig, LocationPayload, PermissionStatus, Reading,
    StreamConfig,
};
use tokio::sync::mpsc;

/// Raw fixes pushed by a registered background task. Errors are transient fix failures.
pub type FixSender = mpsc::Sender<Result<Reading, DomainError>>;

/// Positioning capability.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    /// Resolve a single fix. Fails with `PositionUnavailable` when no fix can be produced.
    async fn current_fix(&self, accuracy: Accuracy) -> Result<Reading, DomainError>;

    /// Register continuous sampling under a stable task name. The provider pushes fixes
    /// into `tx` until `stop_updates` is called or the receiver is dropped.
    ///
    /// Registering a name that is already active replaces the previous registration.
    async fn start_updates(
        &self,
        task_name: &str,
        config: StreamConfig,
        tx: FixSender,
    ) -> Result<(), DomainError>;

    /// Unregister the named task. Unknown names are not an error.
    async fn stop_updates(&self, task_name: &str) -> Result<(), DomainError>;
}

/// HTTP transport to the telemetry endpoint.
#[async_trait::async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// POST `payload` as JSON. Returns the response status code when any response
    /// was received; `DomainError::Transport` when none was (connect error, timeout).
    async fn post_json(&self, url: &str, payload: &LocationPayload) -> Result<u16, DomainError>;
}

/// Local notification capability.
#[async_trait::async_trait]
pub trait NotifierPort: Send + Sync {
    /// Schedule a notification to be shown now.
    async fn schedule(&self, title: &str, body: &str) -> Result<(), DomainError>;
}

/// Consent dialogs for platform capabilities.
#[async_trait::async_trait]
pub trait ConsentPort: Send + Sync {
    async fn request(&self, capability: Capability) -> Result<PermissionStatus, DomainError>;
}

/// Settings storage. Keeps the endpoint URL across restarts.
#[async_trait::async_trait]
pub trait SettingsPort: Send + Sync {
    /// Stored endpoint, or `None` if nothing was saved yet.
    async fn load_endpoint(&self) -> Result<Option<EndpointConfig>, DomainError>;

    async fn save_endpoint(&self, endpoint: &EndpointConfig) -> Result<(), DomainError>;
}
