use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use s3sku_copy::{
    default_concurrency, AwsCli, BucketRoot, RunConfig, RunReport, SkuCopier, DEFAULT_COLUMN,
    DEFAULT_MAX_ITEMS,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Copy S3 folders named by the SKUs in a CSV column into a local directory.
#[derive(Parser, Debug)]
#[command(version, long_about = None)]
struct Args {
    /// CSV file listing the SKUs
    #[arg(long)]
    csv: PathBuf,

    /// Bucket root, e.g. s3://bucket/products/
    #[arg(long)]
    bucket: String,

    /// Local destination root; each SKU lands in <dest>/<SKU>
    #[arg(long)]
    dest: PathBuf,

    /// Concurrent copies (1-20) [default: min(CPUs, 10)]
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Column holding the SKUs
    #[arg(long, default_value = DEFAULT_COLUMN)]
    column: String,

    /// Print what would be copied and exit
    #[arg(long)]
    dry_run: bool,

    /// Skip SKUs whose destination folder already contains files
    #[arg(long)]
    skip_existing: bool,

    /// Refuse to run with more distinct SKUs than this
    #[arg(long, default_value_t = DEFAULT_MAX_ITEMS)]
    max_items: usize,

    /// Per-SKU copy timeout in seconds (0 disables)
    #[arg(long, default_value_t = 3600)]
    timeout_secs: u64,

    /// Log progress every N completed SKUs
    #[arg(long, default_value_t = 10)]
    progress_every: usize,

    /// Append results to this file instead of <dest>/s3sku-copy-<timestamp>.log.jsonl
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Path to the aws CLI [default: looked up on PATH]
    #[arg(long)]
    aws_bin: Option<PathBuf>,

    /// Extra global argument for the aws CLI (repeatable), e.g. --aws-arg=--profile --aws-arg=prod
    #[arg(long = "aws-arg", allow_hyphen_values = true)]
    aws_args: Vec<String>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn setup_logging(verbose: u8, quiet: bool) -> anyhow::Result<()> {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("failed to set up logging")
}

fn build_config(args: &Args) -> s3sku_copy::Result<RunConfig> {
    let bucket_root = BucketRoot::parse(&args.bucket)?;
    let mut config = RunConfig::new(&args.csv, bucket_root, &args.dest);
    config.column = args.column.clone();
    config.max_concurrency = args.concurrency.unwrap_or_else(default_concurrency);
    config.max_items = args.max_items;
    config.dry_run = args.dry_run;
    config.skip_existing = args.skip_existing;
    config.task_timeout = (args.timeout_secs > 0).then(|| Duration::from_secs(args.timeout_secs));
    config.progress_every = args.progress_every;
    Ok(config)
}

fn build_backend(args: &Args) -> s3sku_copy::Result<AwsCli> {
    let cli = match &args.aws_bin {
        Some(path) => AwsCli::new(path),
        None => AwsCli::from_path()?,
    };
    Ok(cli.with_global_args(&args.aws_args))
}

async fn run(args: Args) -> s3sku_copy::Result<RunReport> {
    let config = build_config(&args)?;
    // The aws binary is only needed for a real run.
    let backend = if config.dry_run {
        AwsCli::new(args.aws_bin.clone().unwrap_or_else(|| PathBuf::from("aws")))
    } else {
        build_backend(&args)?
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight copies");
            on_signal.cancel();
        }
    });

    let mut copier = SkuCopier::new(config, Arc::new(backend)).with_cancellation(cancel);
    if let Some(path) = &args.log_file {
        copier = copier.with_log_path(path);
    }
    copier.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = setup_logging(args.verbose, args.quiet) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(RunReport::DryRun(plan)) => {
            info!(count = plan.len(), "dry run; nothing copied");
            for task in &plan {
                println!("{}", task);
            }
            ExitCode::SUCCESS
        }
        Ok(RunReport::Completed(summary)) => {
            println!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}
