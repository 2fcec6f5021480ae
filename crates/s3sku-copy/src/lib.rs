mod backend;
mod config;
mod copier;
mod error;
mod executor;
mod identifiers;
mod input;
mod outcome;
mod pool;
mod result_log;

#[cfg(test)]
mod tests;

pub use backend::{AwsCli, CopyBackend};
pub use config::{
    check_concurrency, default_concurrency, validate_dest_root, BucketRoot, RunConfig, DEFAULT_COLUMN,
    MAX_CONCURRENCY, MIN_CONCURRENCY,
};
pub use copier::{RunReport, SkuCopier};
pub use error::{Error, Result};
pub use executor::{dir_stats, has_any_file, DirStats, TaskExecutor};
pub use identifiers::{
    extract_identifiers, Extraction, Identifier, Rejection, DEFAULT_MAX_ITEMS, MAX_IDENTIFIER_LEN,
};
pub use input::{InputTable, Row};
pub use outcome::{format_timestamp, CopyTask, TaskOutcome, TaskStatus};
pub use pool::{Orchestrator, CANCELLED_MESSAGE, LOST_TASK_MESSAGE};
pub use result_log::{human_bytes, log_file_name, summarize, ResultLog, RunSummary};
