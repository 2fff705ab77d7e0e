//! Platform capability adapters: positioning, notifications, consent dialogs.
//!
//! The desktop build has no OS location service, so positioning is simulated
//! by replaying a track.

pub mod consent;
pub mod notifier;
pub mod replay;

pub use consent::{PromptConsent, StaticConsent};
pub use notifier::TerminalNotifier;
pub use replay::ReplayLocationProvider;
