//! Recorder error types
//!
//! Every failure inside a reproduction run is one of these variants. The
//! session records the message in the capture record before returning it,
//! and the binary maps any of them to a non-zero exit status.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Recorder result type alias
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Recorder error taxonomy
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("upload file not found: {}", path.display())]
    UploadFileMissing { path: PathBuf },

    #[error("browser {operation} failed: {message}")]
    Driver {
        operation: &'static str,
        message: String,
    },

    #[error("timed out after {}ms waiting for {waiting_for}: {detail}", after.as_millis())]
    Timeout {
        waiting_for: String,
        after: Duration,
        detail: String,
    },

    #[error("no element matches selector `{selector}`")]
    SelectorNotFound { selector: String },

    #[error("failed to write {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize capture record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("interrupted")]
    Cancelled,
}

impl RecorderError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Wrap a browser-side failure for the named operation.
    pub fn driver(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Driver {
            operation,
            message: err.to_string(),
        }
    }

    /// Machine-readable code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "CONFIG_ERROR",
            Self::UploadFileMissing { .. } => "UPLOAD_FILE_MISSING",
            Self::Driver { .. } => "DRIVER_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::SelectorNotFound { .. } => "SELECTOR_NOT_FOUND",
            Self::Artifact { .. } => "ARTIFACT_ERROR",
            Self::Serialize(_) => "SERIALIZE_ERROR",
            Self::Cancelled => "CANCELLED",
        }
    }
}
