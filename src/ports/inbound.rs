//! Inbound port. UI (adapter) calls into the application.

use crate::domain::DomainError;

/// Input port: UI/CLI drives the coordinator until the user quits.
#[async_trait::async_trait]
pub trait InputPort: Send + Sync {
    /// Run the interactive loop (set URL, fetch, send, tracking).
    async fn run(&self) -> Result<(), DomainError>;
}
