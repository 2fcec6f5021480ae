//! Run configuration and validation of external inputs.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::{Error, Result};
use crate::identifiers::{Identifier, DEFAULT_MAX_ITEMS};

pub const DEFAULT_COLUMN: &str = "Supplier Item #";
pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 20;
pub const DEFAULT_PROGRESS_EVERY: usize = 10;

static BUCKET_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^s3://[a-z0-9][a-z0-9.-]{1,61}[a-z0-9](/.*)?$").expect("bucket pattern is valid")
});

const DISALLOWED_PATH_CHARS: &[char] = &['<', '>', '"', '|', '?', '*', '\0'];

/// min(available parallelism, 10)
pub fn default_concurrency() -> usize {
    num_cpus::get().clamp(MIN_CONCURRENCY, 10)
}

/// Reject concurrency outside 1..=20; nothing is clamped.
pub fn check_concurrency(max_concurrency: usize) -> Result<()> {
    if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&max_concurrency) {
        return Err(Error::config(
            "max_concurrency",
            format!(
                "concurrency must be between {} and {}, got {}",
                MIN_CONCURRENCY, MAX_CONCURRENCY, max_concurrency
            ),
        ));
    }
    Ok(())
}

/// Validated `s3://bucket/prefix/` root, always ending in a single `/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRoot(String);

impl BucketRoot {
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if !BUCKET_URI.is_match(uri) {
            return Err(Error::config(
                "bucket_root",
                format!("expected s3://<bucket>[/<prefix>], got \"{}\"", uri),
            ));
        }
        let rest = &uri["s3://".len()..];
        if rest.split('/').skip(1).any(|seg| seg == "..") {
            return Err(Error::config(
                "bucket_root",
                format!("bucket root must not contain \"..\": \"{}\"", uri),
            ));
        }
        Ok(BucketRoot(format!("{}/", uri.trim_end_matches('/'))))
    }

    /// `s3://bucket/prefix/<identifier>/`
    pub fn source_for(&self, identifier: &Identifier) -> String {
        format!("{}{}/", self.0, identifier)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reject empty paths, `..` components and characters that are unsafe in a
/// destination directory.
pub fn validate_dest_root(path: &Path) -> Result<()> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(Error::config("dest_root", "destination path is empty"));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(Error::config(
            "dest_root",
            format!("destination path must not contain \"..\": {}", text),
        ));
    }
    if let Some(c) = text.chars().find(|c| DISALLOWED_PATH_CHARS.contains(c)) {
        return Err(Error::config(
            "dest_root",
            format!("destination path contains disallowed character {:?}: {}", c, text),
        ));
    }
    Ok(())
}

/// Everything one run needs
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// CSV file supplying the identifiers
    pub csv_path: PathBuf,
    pub bucket_root: BucketRoot,
    /// Local root; each identifier is copied into `dest_root/<identifier>`
    pub dest_root: PathBuf,
    /// Column holding identifiers (default: "Supplier Item #")
    pub column: String,
    /// Concurrent copies, 1..=20
    pub max_concurrency: usize,
    /// Upper bound on distinct identifiers (default: 10,000)
    pub max_items: usize,
    pub dry_run: bool,
    /// Treat a destination folder holding at least one file as done
    pub skip_existing: bool,
    /// Kill a copy that runs longer than this (None = no deadline)
    pub task_timeout: Option<Duration>,
    /// Emit a progress line every N completions
    pub progress_every: usize,
}

impl RunConfig {
    pub fn new(csv_path: impl Into<PathBuf>, bucket_root: BucketRoot, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            bucket_root,
            dest_root: dest_root.into(),
            column: DEFAULT_COLUMN.to_string(),
            max_concurrency: default_concurrency(),
            max_items: DEFAULT_MAX_ITEMS,
            dry_run: false,
            skip_existing: false,
            task_timeout: None,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }

    /// Check every setting. Out-of-range concurrency is rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        check_concurrency(self.max_concurrency)?;
        if self.column.trim().is_empty() {
            return Err(Error::config("column", "column name is empty"));
        }
        if self.max_items == 0 {
            return Err(Error::config("max_items", "max_items must be at least 1"));
        }
        if self.progress_every == 0 {
            return Err(Error::config("progress_every", "progress_every must be at least 1"));
        }
        if matches!(self.task_timeout, Some(t) if t.is_zero()) {
            return Err(Error::config("task_timeout", "task timeout must be positive"));
        }
        validate_dest_root(&self.dest_root)?;
        if !self.csv_path.is_file() {
            return Err(Error::config(
                "csv_path",
                format!("CSV file not found: {}", self.csv_path.display()),
            ));
        }
        Ok(())
    }
}
