//! Implements InputPort. Inquire-based interactive menu.
//!
//! Only talks to the Coordinator: reads its snapshot, triggers its operations.

use crate::adapters::ui::progress::with_spinner;
use crate::domain::DomainError;
use crate::ports::InputPort;
use crate::usecases::{Coordinator, CoordinatorSnapshot, Phase};
use async_trait::async_trait;
use inquire::{InquireError, Select, Text};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    SetServerUrl,
    GetLocation,
    SendLocation,
    StartTracking,
    StopTracking,
    Quit,
}

impl MenuItem {
    fn for_snapshot(snapshot: &CoordinatorSnapshot) -> Vec<MenuItem> {
        let tracking = if snapshot.tracking {
            MenuItem::StopTracking
        } else {
            MenuItem::StartTracking
        };
        vec![
            MenuItem::SetServerUrl,
            MenuItem::GetLocation,
            MenuItem::SendLocation,
            tracking,
            MenuItem::Quit,
        ]
    }
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuItem::SetServerUrl => "Set server URL",
            MenuItem::GetLocation => "Get current location",
            MenuItem::SendLocation => "Send location to server",
            MenuItem::StartTracking => "Start background tracking",
            MenuItem::StopTracking => "Stop background tracking",
            MenuItem::Quit => "Quit",
        };
        f.write_str(label)
    }
}

/// Status block printed above the menu.
fn render_status(snapshot: &CoordinatorSnapshot) -> String {
    let mut lines = Vec::new();
    let url = if snapshot.endpoint.is_set() {
        snapshot.endpoint.url.as_str()
    } else {
        "(not set)"
    };
    lines.push(format!("Server URL: {}", url));
    match &snapshot.last_reading {
        Some(reading) => {
            lines.push(format!("Latitude: {:.6}", reading.latitude()));
            lines.push(format!("Longitude: {:.6}", reading.longitude()));
        }
        None => lines.push("Location: (not fetched)".to_string()),
    }
    let phase = match snapshot.phase {
        Phase::Idle => "idle",
        Phase::LocationFetched => "location fetched",
        Phase::Sending => "sending",
    };
    let tracking = if snapshot.tracking { "on" } else { "off" };
    lines.push(format!("State: {}  |  Background tracking: {}", phase, tracking));
    if let Some(message) = &snapshot.last_message {
        lines.push(format!("> {}", message));
    }
    lines.join("\n")
}

/// TUI adapter. Inquire prompts.
pub struct TuiInputPort {
    coordinator: Arc<Coordinator>,
}

impl TuiInputPort {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    async fn handle(&self, item: MenuItem) -> Result<bool, DomainError> {
        match item {
            MenuItem::SetServerUrl => {
                let current = self.coordinator.snapshot().endpoint.url;
                let url = match Text::new("Server URL:")
                    .with_initial_value(&current)
                    .with_placeholder("https://example.com/locations")
                    .prompt()
                {
                    Ok(url) => url,
                    Err(InquireError::OperationCanceled) => return Ok(true),
                    Err(e) => return Err(DomainError::Ui(e.to_string())),
                };
                self.coordinator.set_endpoint(&url).await;
            }
            MenuItem::GetLocation => {
                let result =
                    with_spinner("Getting current location...", self.coordinator.fetch_location())
                        .await;
                if let Err(e) = result {
                    debug!(error = %e, "fetch reported to user");
                }
            }
            MenuItem::SendLocation => {
                let result = with_spinner(
                    "Sending location to server...",
                    self.coordinator.send_current_location(),
                )
                .await;
                if let Err(e) = result {
                    debug!(error = %e, "send rejected");
                }
            }
            MenuItem::StartTracking => {
                if let Err(e) = self.coordinator.start_tracking().await {
                    debug!(error = %e, "tracking not started");
                }
            }
            MenuItem::StopTracking => self.coordinator.stop_tracking().await,
            MenuItem::Quit => return Ok(false),
        }
        Ok(true)
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run(&self) -> Result<(), DomainError> {
        for warning in self.coordinator.permission_warnings().await {
            println!("Permission required: {}", warning);
        }

        loop {
            let snapshot = self.coordinator.snapshot();
            println!("\n{}\n", render_status(&snapshot));

            let item = match Select::new("Action:", MenuItem::for_snapshot(&snapshot)).prompt() {
                Ok(item) => item,
                Err(InquireError::OperationCanceled) => continue,
                Err(InquireError::OperationInterrupted) => return Ok(()),
                Err(e) => return Err(DomainError::Ui(e.to_string())),
            };

            if !self.handle(item).await? {
                return Ok(());
            }
        }
    }
}
