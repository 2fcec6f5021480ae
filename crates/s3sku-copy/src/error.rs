//! Error types for s3sku-copy
//!
//! Only run-level failures are represented here. A single SKU failing to copy
//! is not an [`Error`] for the run; it ends up as a [`crate::TaskOutcome`]
//! with status `error`.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for s3sku-copy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for s3sku-copy
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing required input, detected before any task starts
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
        /// The setting or column that caused the error (e.g. "bucket_root")
        key: Option<String>,
    },

    /// No valid identifiers survived extraction
    #[error("no valid identifiers found in input")]
    EmptyInput,

    /// More identifiers than the configured ceiling
    #[error("too many identifiers: found {count}, limit is {limit}")]
    TooManyItems {
        /// Number of valid, deduplicated identifiers
        count: usize,
        /// Configured ceiling
        limit: usize,
    },

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External copy tool could not be run or exited unsuccessfully
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// A copy did not finish before its deadline
    #[error("timed out after {after:?}")]
    Timeout {
        /// The deadline that elapsed
        after: Duration,
    },
}

impl Error {
    /// Build a configuration error tied to a setting
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Process exit code for a run that failed with this error
    ///
    /// Configuration and input errors exit with 2, identifier-set errors with 3,
    /// anything else with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config { .. } | Error::Csv(_) | Error::Io(_) => 2,
            Error::EmptyInput | Error::TooManyItems { .. } => 3,
            _ => 1,
        }
    }
}
