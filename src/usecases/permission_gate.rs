//! Acquire and track consent for location and notification capabilities.
//!
//! Consent is asked one capability at a time (some platforms cannot stack prompts).
//! A failing consent provider never aborts startup: the capability is recorded as
//! Denied and the agent keeps running with whatever subset was granted.

use crate::domain::{Capability, PermissionState, PermissionStatus};
use crate::ports::ConsentPort;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub struct PermissionGate {
    consent: Arc<dyn ConsentPort>,
    state: RwLock<PermissionState>,
}

impl PermissionGate {
    pub fn new(consent: Arc<dyn ConsentPort>) -> Self {
        Self {
            consent,
            state: RwLock::new(PermissionState::default()),
        }
    }

    /// Ask for foreground location, background location, then notifications.
    pub async fn request_all(&self) -> PermissionState {
        let mut state = PermissionState::default();
        for capability in Capability::ALL {
            let status = match self.consent.request(capability).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(%capability, error = %e, "consent request failed; treating as denied");
                    PermissionStatus::Denied
                }
            };
            info!(%capability, ?status, "consent resolved");
            state.set(capability, status);
        }
        *self.state.write().await = state;
        state
    }

    /// Last resolved state. All Undetermined before `request_all`.
    pub async fn current(&self) -> PermissionState {
        *self.state.read().await
    }

    pub async fn can_locate(&self) -> bool {
        self.current().await.foreground_location.is_granted()
    }

    pub async fn can_track_in_background(&self) -> bool {
        self.current().await.location_fully_granted()
    }

    pub async fn can_notify(&self) -> bool {
        self.current().await.notifications.is_granted()
    }
}
