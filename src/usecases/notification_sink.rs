//! Surface delivery outcomes as local notifications. Fire-and-forget.

use crate::domain::DeliveryOutcome;
use crate::ports::NotifierPort;
use crate::usecases::PermissionGate;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const NOTIFICATION_TITLE: &str = "Location Update";

pub struct NotificationSink {
    notifier: Arc<dyn NotifierPort>,
    gate: Arc<PermissionGate>,
}

impl NotificationSink {
    pub fn new(notifier: Arc<dyn NotifierPort>, gate: Arc<PermissionGate>) -> Self {
        Self { notifier, gate }
    }

    /// Schedule `message` in the background. Errors are logged, never returned.
    /// The handle is only useful to tests; callers are free to drop it.
    pub fn notify(&self, message: impl Into<String>) -> JoinHandle<()> {
        let message = message.into();
        let notifier = Arc::clone(&self.notifier);
        let gate = Arc::clone(&self.gate);
        tokio::spawn(async move {
            if !gate.can_notify().await {
                info!(%message, "notifications not granted; outcome not shown");
                return;
            }
            match notifier.schedule(NOTIFICATION_TITLE, &message).await {
                Ok(()) => debug!(%message, "notification scheduled"),
                Err(e) => warn!(error = %e, %message, "failed to schedule notification"),
            }
        })
    }

    pub fn report(&self, outcome: &DeliveryOutcome) -> JoinHandle<()> {
        self.notify(outcome.message())
    }
}
