//! Append-only JSON-lines log of task outcomes, and the end-of-run summary.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::outcome::{TaskOutcome, TaskStatus};

/// Log file name for a run started at `started`
pub fn log_file_name(started: &DateTime<Utc>) -> String {
    format!("s3sku-copy-{}.log.jsonl", started.format("%Y%m%dT%H%M%S%3fZ"))
}

/// One log per run. Each record is written and flushed as a single line, so
/// an interrupted run leaves only complete records behind.
pub struct ResultLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ResultLog {
    /// Create `dest_root` if needed and open a fresh log inside it
    pub fn create(dest_root: &Path, started: &DateTime<Utc>) -> Result<Self> {
        fs::create_dir_all(dest_root)?;
        Self::append_to(dest_root.join(log_file_name(started)))
    }

    /// Append to an explicit log file, creating it if missing
    pub fn append_to(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one outcome. Safe to call from several workers at once.
    pub fn record(&self, outcome: &TaskOutcome) -> Result<()> {
        let mut line = serde_json::to_vec(outcome)?;
        line.push(b'\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("result log lock poisoned")))?;
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }

    /// Parse a log written by [`ResultLog::record`]; blank lines are ignored.
    pub fn read_outcomes(path: &Path) -> Result<Vec<TaskOutcome>> {
        let reader = BufReader::new(File::open(path)?);
        let mut outcomes = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            outcomes.push(serde_json::from_str(&line)?);
        }
        Ok(outcomes)
    }
}

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub files_transferred: u64,
    pub bytes_transferred: u64,
    pub elapsed: Duration,
    pub log_path: PathBuf,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

pub fn summarize(outcomes: &[TaskOutcome], elapsed: Duration, log_path: PathBuf) -> RunSummary {
    let mut summary = RunSummary {
        total: outcomes.len(),
        elapsed,
        log_path,
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome.status {
            TaskStatus::Success => summary.succeeded += 1,
            TaskStatus::Skipped => summary.skipped += 1,
            TaskStatus::Error => summary.failed += 1,
            TaskStatus::Planned => {}
        }
        summary.files_transferred += outcome.files_transferred;
        summary.bytes_transferred += outcome.bytes_transferred;
    }
    summary
}

/// 1536 -> "1.50 KiB"
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.2} {}", value, unit)
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run summary")?;
        writeln!(f, "  identifiers: {}", self.total)?;
        writeln!(f, "  succeeded:   {}", self.succeeded)?;
        writeln!(f, "  skipped:     {}", self.skipped)?;
        writeln!(f, "  failed:      {}", self.failed)?;
        writeln!(
            f,
            "  transferred: {} files, {}",
            self.files_transferred,
            human_bytes(self.bytes_transferred)
        )?;
        writeln!(f, "  elapsed:     {:.1}s", self.elapsed.as_secs_f64())?;
        write!(f, "  log:         {}", self.log_path.display())
    }
}
