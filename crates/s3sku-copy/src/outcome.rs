//! Per-task data: what to copy and how it went.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::identifiers::Identifier;

/// One identifier bound to its source prefix and destination folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    pub identifier: Identifier,
    pub source: String,
    pub destination: PathBuf,
}

impl fmt::Display for CopyTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination.display())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Skipped,
    Error,
    /// Dry-run only; never written to the log
    Planned,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Success => "success",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Error => "error",
            TaskStatus::Planned => "planned",
        };
        f.write_str(s)
    }
}

/// Result of one copy task. Serialized as one line of the run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    #[serde(serialize_with = "ser_timestamp", deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "sku")]
    pub identifier: Identifier,
    pub status: TaskStatus,
    pub duration_ms: u64,
    pub files_transferred: u64,
    pub bytes_transferred: u64,
    pub error: Option<String>,
}

impl TaskOutcome {
    fn new(identifier: Identifier, status: TaskStatus, elapsed: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            identifier,
            status,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            files_transferred: 0,
            bytes_transferred: 0,
            error: None,
        }
    }

    pub fn success(identifier: Identifier, elapsed: Duration, files: u64, bytes: u64) -> Self {
        Self {
            files_transferred: files,
            bytes_transferred: bytes,
            ..Self::new(identifier, TaskStatus::Success, elapsed)
        }
    }

    pub fn skipped(identifier: Identifier, elapsed: Duration) -> Self {
        Self::new(identifier, TaskStatus::Skipped, elapsed)
    }

    pub fn failed(identifier: Identifier, elapsed: Duration, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "unknown error".to_string();
        }
        Self {
            error: Some(message),
            ..Self::new(identifier, TaskStatus::Error, elapsed)
        }
    }

    pub fn planned(identifier: Identifier) -> Self {
        Self::new(identifier, TaskStatus::Planned, Duration::ZERO)
    }
}

/// RFC 3339 UTC with millisecond precision, e.g. `2024-05-01T12:00:00.123Z`
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn ser_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(ts))
}

fn de_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}
