use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::CopyBackend;
use crate::config::RunConfig;
use crate::error::Result;
use crate::executor::TaskExecutor;
use crate::identifiers::extract_identifiers;
use crate::input::InputTable;
use crate::outcome::{CopyTask, TaskOutcome, TaskStatus};
use crate::pool::Orchestrator;
use crate::result_log::{summarize, ResultLog, RunSummary};

/// What a run produced
#[derive(Debug, Clone)]
pub enum RunReport {
    /// Planned copies; nothing was written
    DryRun(Vec<CopyTask>),
    Completed(RunSummary),
}

/// Counts completions and decides when a progress line is due
#[derive(Debug, Clone)]
pub(crate) struct Progress {
    total: usize,
    every: usize,
    done: usize,
    failed: usize,
}

impl Progress {
    pub(crate) fn new(total: usize, every: usize) -> Self {
        Self {
            total,
            every: every.max(1),
            done: 0,
            failed: 0,
        }
    }

    /// Count one outcome; true every `every` completions and on the last one.
    pub(crate) fn observe(&mut self, outcome: &TaskOutcome) -> bool {
        self.done += 1;
        if outcome.status == TaskStatus::Error {
            self.failed += 1;
        }
        self.done % self.every == 0 || self.done == self.total
    }

    pub(crate) fn done(&self) -> usize {
        self.done
    }

    pub(crate) fn failed(&self) -> usize {
        self.failed
    }
}

/// Copies every SKU listed in a CSV from the bucket root into the destination
pub struct SkuCopier {
    config: RunConfig,
    backend: Arc<dyn CopyBackend>,
    cancel: CancellationToken,
    log_path: Option<PathBuf>,
}

impl SkuCopier {
    pub fn new(config: RunConfig, backend: Arc<dyn CopyBackend>) -> Self {
        Self {
            config,
            backend,
            cancel: CancellationToken::new(),
            log_path: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Append results to `path` instead of a fresh log under the destination root
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Validate, extract, then copy everything (or just plan it in dry-run mode).
    ///
    /// Errors are returned only for problems found before the first copy
    /// starts. Failed copies are counted in the summary instead.
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let started = Instant::now();

        self.config.validate()?;
        let table = InputTable::from_csv_path(&self.config.csv_path)?;
        let extraction = extract_identifiers(&table, &self.config.column, self.config.max_items)?;
        if !extraction.rejected.is_empty() {
            warn!(count = extraction.rejected.len(), "some identifiers were rejected");
        }
        let identifiers = extraction.identifiers;
        info!(count = identifiers.len(), column = %self.config.column, "identifiers loaded");

        let executor = TaskExecutor::new(
            self.backend.clone(),
            self.config.bucket_root.clone(),
            self.config.dest_root.clone(),
        )
        .skip_existing(self.config.skip_existing)
        .dry_run(self.config.dry_run)
        .timeout(self.config.task_timeout);

        if self.config.dry_run {
            let plan = identifiers.iter().map(|id| executor.plan(id)).collect();
            return Ok(RunReport::DryRun(plan));
        }

        let log = match &self.log_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                ResultLog::append_to(path.clone())?
            }
            None => ResultLog::create(&self.config.dest_root, &started_at)?,
        };
        info!(
            log = %log.path().display(),
            concurrency = self.config.max_concurrency,
            "starting copy"
        );

        let total = identifiers.len();
        let mut progress = Progress::new(total, self.config.progress_every);

        let orchestrator = Orchestrator::new(self.config.max_concurrency)?
            .with_cancellation(self.cancel.clone());
        let outcomes = orchestrator
            .run(
                identifiers,
                |id| {
                    let executor = executor.clone();
                    async move { executor.execute(id).await }
                },
                |outcome| {
                    if let Err(e) = log.record(outcome) {
                        error!(sku = %outcome.identifier, error = %e, "failed to append result log");
                    }
                    debug!(
                        sku = %outcome.identifier,
                        status = %outcome.status,
                        duration_ms = outcome.duration_ms,
                        "task finished"
                    );
                    if progress.observe(outcome) {
                        info!(
                            "progress: {}/{} done, {} failed",
                            progress.done(),
                            total,
                            progress.failed()
                        );
                    }
                },
            )
            .await;

        let summary = summarize(&outcomes, started.elapsed(), PathBuf::from(log.path()));
        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "run complete"
        );
        Ok(RunReport::Completed(summary))
    }
}
