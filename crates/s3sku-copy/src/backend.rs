//! External copy tool integration.
//!
//! The core never talks to S3 itself. Each SKU prefix is handed to a
//! [`CopyBackend`], normally [`AwsCli`], which runs `aws s3 cp --recursive`
//! and reports success or the tool's error output. The child is killed if
//! the copy future is dropped, which is how task timeouts stop it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Copies everything under a remote prefix into a local directory
#[async_trait]
pub trait CopyBackend: Send + Sync {
    /// Copy `source` (an `s3://.../` prefix) recursively into `dest`.
    ///
    /// Must be idempotent: re-running over an existing destination overwrites
    /// or skips current files but never fails because they exist.
    async fn copy_prefix(&self, source: &str, dest: &Path) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// `aws s3 cp` driven through a child process
#[derive(Debug, Clone)]
pub struct AwsCli {
    binary_path: PathBuf,
    global_args: Vec<OsString>,
}

impl AwsCli {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            global_args: Vec::new(),
        }
    }

    /// Locate `aws` on PATH
    pub fn from_path() -> Result<Self> {
        which::which("aws").map(Self::new).map_err(|e| {
            Error::config("aws_bin", format!("aws CLI not found on PATH: {}", e))
        })
    }

    /// Arguments placed before `s3 cp`, e.g. `--profile prod` or `--endpoint-url ...`
    pub fn with_global_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.global_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn command(&self, source: &str, dest: &Path) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.global_args)
            .args(["s3", "cp", source])
            .arg(dest)
            .args(["--recursive", "--only-show-errors", "--no-follow-symlinks"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl CopyBackend for AwsCli {
    async fn copy_prefix(&self, source: &str, dest: &Path) -> Result<()> {
        let child = self.command(source, dest).spawn().map_err(|e| {
            Error::ExternalTool(format!(
                "failed to execute {}: {}",
                self.binary_path.display(),
                e
            ))
        })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed waiting for copy: {}", e)))?;

        if output.status.success() {
            debug!(source, dest = %dest.display(), "copy finished");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let message = if stderr.is_empty() {
            format!("copy exited with {}", output.status)
        } else {
            stderr.to_string()
        };
        Err(Error::ExternalTool(message))
    }

    fn name(&self) -> &'static str {
        "aws-cli"
    }
}
