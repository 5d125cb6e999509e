//! Error types for brocade-telemetryd
//!
//! Only the outer surfaces (configuration, REST transport, metrics exposition)
//! can fail. Parsers and diff primitives degrade missing data to `None`.

use thiserror::Error;

/// Telemetry daemon errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// REST transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// FOS REST login answered without a session token
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// FOS REST login answered with a non-2xx status
    #[error("Login to {url} returned status {status}")]
    LoginRejected { url: String, status: u16 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Prometheus registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

/// Result type for brocade-telemetryd operations
pub type Result<T> = std::result::Result<T, TelemetryError>;
