//! Error types for the lanwarden-monitor crate.

use std::time::Duration;

use thiserror::Error;

/// Failures of one sweep invocation. Aborts only the current cycle.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Sweep tool not found at path: {path}")]
    ToolNotFound { path: String },

    #[error("Sweep of {target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    #[error("Sweep tool exited with code {code}: {stderr}")]
    SweepFailed { code: i32, stderr: String },

    #[error("Failed to decode sweep output: {0}")]
    UnparsableOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of one alert send. Always non-fatal, isolated per event.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("SMTP connection failed: {source}")]
    ConnectionFailed {
        #[source]
        source: lettre::transport::smtp::Error,
    },

    #[error("SMTP authentication rejected: {source}")]
    AuthRejected {
        #[source]
        source: lettre::transport::smtp::Error,
    },

    #[error("Notification send timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to build alert message: {0}")]
    Message(#[from] lettre::error::Error),
}

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Registry error: {0}")]
    Store(#[from] lanwarden_registry::StoreError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
