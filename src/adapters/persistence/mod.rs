//! Local persistence adapters.

pub mod settings_json;

pub use settings_json::SettingsJson;
