use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::*;

mod executor;

pub(crate) const FAKE_FILE_BYTES: &[u8] = b"0123456789";

/// In-memory stand-in for the aws CLI. Writes one 10-byte file per copy,
/// fails for the listed identifiers and tracks how many copies overlap.
#[derive(Default)]
pub(crate) struct FakeBackend {
    failing: HashSet<String>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    live: AtomicUsize,
    max_live: AtomicUsize,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(mut self, ids: &[&str]) -> Self {
        self.failing = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CopyBackend for FakeBackend {
    async fn copy_prefix(&self, source: &str, dest: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(source.to_string());
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let sku = source.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
        let result = if self.failing.contains(sku) {
            Err(Error::ExternalTool(format!("fatal error: NoSuchKey {}", sku)))
        } else {
            std::fs::write(dest.join("data.bin"), FAKE_FILE_BYTES).map_err(Error::from)
        };

        self.live.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub(crate) fn id(raw: &str) -> Identifier {
    Identifier::parse(raw).unwrap()
}

pub(crate) fn table(column: &str, values: &[&str]) -> InputTable {
    let rows: Vec<Row> = values
        .iter()
        .map(|v| Row::from([(column.to_string(), v.to_string())]))
        .collect();
    InputTable::new(vec![column.to_string()], rows)
}

pub(crate) fn write_csv(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("skus.csv");
    std::fs::write(&path, contents).unwrap();
    path
}
