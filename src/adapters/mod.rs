//! Infrastructure adapters. Implement ports.
//!
//! HTTP endpoint, platform capabilities, settings file, terminal UI. Map errors to DomainError.

pub mod http;
#[cfg(test)]
pub mod mock;
pub mod persistence;
pub mod platform;
pub mod ui;
