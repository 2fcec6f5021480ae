//! Runs a single SKU copy and turns whatever happens into a [`TaskOutcome`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::backend::CopyBackend;
use crate::config::BucketRoot;
use crate::error::Error;
use crate::identifiers::Identifier;
use crate::outcome::{CopyTask, TaskOutcome};

/// File count and total size of a directory tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirStats {
    pub files: u64,
    pub bytes: u64,
}

/// True when `dir` exists and holds at least one file at any depth.
pub fn has_any_file(dir: &Path) -> io::Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    for entry in WalkDir::new(dir).min_depth(1) {
        if entry.map_err(io::Error::from)?.file_type().is_file() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Count regular files under `dir` and sum their sizes.
pub fn dir_stats(dir: &Path) -> io::Result<DirStats> {
    let mut stats = DirStats::default();
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            stats.files += 1;
            stats.bytes += entry.metadata().map_err(io::Error::from)?.len();
        }
    }
    Ok(stats)
}

async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

/// Executes copy tasks for one run. Cheap to clone; shared by all workers.
#[derive(Clone)]
pub struct TaskExecutor {
    backend: Arc<dyn CopyBackend>,
    source_root: BucketRoot,
    dest_root: PathBuf,
    skip_existing: bool,
    dry_run: bool,
    timeout: Option<Duration>,
}

impl TaskExecutor {
    pub fn new(backend: Arc<dyn CopyBackend>, source_root: BucketRoot, dest_root: PathBuf) -> Self {
        Self {
            backend,
            source_root,
            dest_root,
            skip_existing: false,
            dry_run: false,
            timeout: None,
        }
    }

    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Abandon a copy that runs longer than `timeout`. Dropping the backend
    /// future is what stops the transfer.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn plan(&self, identifier: &Identifier) -> CopyTask {
        CopyTask {
            identifier: identifier.clone(),
            source: self.source_root.source_for(identifier),
            destination: self.dest_root.join(identifier.as_str()),
        }
    }

    /// Copy one identifier. Never fails: every error becomes an `error` outcome.
    pub async fn execute(&self, identifier: Identifier) -> TaskOutcome {
        if self.dry_run {
            return TaskOutcome::planned(identifier);
        }

        let started = Instant::now();
        let task = self.plan(&identifier);

        if self.skip_existing {
            let dest = task.destination.clone();
            match blocking(move || has_any_file(&dest)).await {
                Ok(true) => {
                    debug!(sku = %identifier, "destination not empty, skipping");
                    return TaskOutcome::skipped(identifier, started.elapsed());
                }
                Ok(false) => {}
                Err(e) => {
                    let message = format!("failed to inspect {}: {}", task.destination.display(), e);
                    return self.fail(identifier, started, message);
                }
            }
        }

        if let Err(e) = tokio::fs::create_dir_all(&task.destination).await {
            let message = format!("failed to create {}: {}", task.destination.display(), e);
            return self.fail(identifier, started, message);
        }

        let copy = self.backend.copy_prefix(&task.source, &task.destination);
        let copied = match self.timeout {
            Some(after) => tokio::time::timeout(after, copy)
                .await
                .unwrap_or(Err(Error::Timeout { after })),
            None => copy.await,
        };
        if let Err(e) = copied {
            return self.fail(identifier, started, e.to_string());
        }

        // Counts what is present afterwards, which includes files an earlier
        // run already copied.
        let dest = task.destination.clone();
        match blocking(move || dir_stats(&dest)).await {
            Ok(stats) => TaskOutcome::success(identifier, started.elapsed(), stats.files, stats.bytes),
            Err(e) => {
                let message = format!(
                    "copied but failed to enumerate {}: {}",
                    task.destination.display(),
                    e
                );
                self.fail(identifier, started, message)
            }
        }
    }

    fn fail(&self, identifier: Identifier, started: Instant, message: String) -> TaskOutcome {
        warn!(sku = %identifier, backend = self.backend.name(), error = %message, "copy failed");
        TaskOutcome::failed(identifier, started.elapsed(), message)
    }
}
