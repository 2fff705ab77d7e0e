//! HTTP adapter for the telemetry endpoint.

pub mod transport;

pub use transport::HttpTransport;
