//! Consent adapters. Implement ConsentPort.
//!
//! - `PromptConsent`: asks on the terminal with an inquire confirm dialog
//! - `StaticConsent`: answers every request the same way (headless / auto-grant)

use crate::domain::{Capability, DomainError, PermissionStatus};
use crate::ports::ConsentPort;
use inquire::{Confirm, InquireError};

pub struct StaticConsent {
    status: PermissionStatus,
}

impl StaticConsent {
    pub fn granting() -> Self {
        Self {
            status: PermissionStatus::Granted,
        }
    }

    pub fn denying() -> Self {
        Self {
            status: PermissionStatus::Denied,
        }
    }
}

#[async_trait::async_trait]
impl ConsentPort for StaticConsent {
    async fn request(&self, _capability: Capability) -> Result<PermissionStatus, DomainError> {
        Ok(self.status)
    }
}

/// Interactive consent dialog. Esc counts as "deny"; Ctrl-C is an error.
#[derive(Default)]
pub struct PromptConsent;

impl PromptConsent {
    pub fn new() -> Self {
        Self
    }
}

fn help_for(capability: Capability) -> &'static str {
    match capability {
        Capability::ForegroundLocation => "Needed to read your current position on demand.",
        Capability::BackgroundLocation => {
            "Needed to keep sampling while the app is idle (every 10 m moved by default)."
        }
        Capability::Notifications => "Needed to tell you whether readings reached the server.",
    }
}

#[async_trait::async_trait]
impl ConsentPort for PromptConsent {
    async fn request(&self, capability: Capability) -> Result<PermissionStatus, DomainError> {
        let prompt = format!("Allow geo-relay to use {}?", capability);
        let answer = Confirm::new(&prompt)
            .with_default(true)
            .with_help_message(help_for(capability))
            .prompt();

        match answer {
            Ok(true) => Ok(PermissionStatus::Granted),
            Ok(false) | Err(InquireError::OperationCanceled) => Ok(PermissionStatus::Denied),
            Err(e) => Err(DomainError::Ui(e.to_string())),
        }
    }
}
