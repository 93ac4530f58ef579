///
/// This module implements the CLI interface for bls-sync: command parsing,
/// argument exposure, the async [`run`] entrypoint and the end-of-run report.
///
/// All sync logic (listing, inventory, plan, execution) lives in the
/// [`bls-sync-core`] crate. This module wires the real HTTP transport and the
/// S3 store into it and turns the outcome into an exit status.
///
/// ## How To Use
/// - From the shell: `bls-sync sync --bucket my-bucket --prefix bls/pr`.
/// - Programmatically: call [`run`] with a constructed [`Cli`].
///
/// [`bls-sync-core`]: ../../bls-sync-core/
use crate::load_config::resolve;
use crate::store::S3Store;
use anyhow::{anyhow, Result};
use bls_sync_core::fetch::{Fetcher, ReqwestTransport};
use bls_sync_core::plan::{SyncAction, SyncPlan};
use bls_sync_core::synchronise::{prepare_plan, synchronise, CancelFlag, RunSummary};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI for bls-sync: mirror the BLS time.series/pr listing into S3.
#[derive(Parser, Debug)]
#[clap(
    name = "bls-sync",
    version,
    about = "Mirror an HTTP directory listing (BLS time.series/pr) into an S3 bucket prefix"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload new and changed files, optionally deleting objects no longer listed
    Sync(SyncArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Target bucket
    #[clap(long, env = "BLS_SYNC_BUCKET")]
    pub bucket: String,

    /// Key prefix inside the bucket, e.g. `bls/pr` (surrounding slashes are ignored)
    #[clap(long, env = "BLS_SYNC_PREFIX")]
    pub prefix: String,

    /// Delete objects under the prefix that are no longer listed upstream
    #[clap(long, env = "BLS_SYNC_DELETE_MISSING")]
    pub delete_missing: bool,

    /// Minimum seconds between upstream request starts
    #[clap(long, env = "BLS_SYNC_RATE_LIMIT")]
    pub rate_limit: Option<f64>,

    /// User-Agent sent upstream (the server rejects anonymous clients)
    #[clap(long, env = "BLS_SYNC_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Directory listing URL to mirror
    #[clap(long, env = "BLS_SYNC_BASE_URL")]
    pub base_url: Option<String>,

    /// Custom S3 endpoint (MinIO, Ceph RGW, ...); enables path-style addressing
    #[clap(long, env = "BLS_SYNC_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// S3 region, overriding the AWS provider chain
    #[clap(long, env = "BLS_SYNC_REGION")]
    pub region: Option<String>,

    /// Optional YAML file with fetch tuning (timeouts, retries, headers)
    #[clap(long, env = "BLS_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Compute and print the plan without changing the store
    #[clap(long)]
    pub dry_run: bool,

    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
}

/// How a completed invocation ended. Fatal errors are returned as `Err` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Clean,
    Planned,
    ItemFailures,
    Cancelled,
}

impl Outcome {
    pub fn from_summary(summary: &RunSummary) -> Self {
        if summary.cancelled {
            Outcome::Cancelled
        } else if summary.failed > 0 {
            Outcome::ItemFailures
        } else {
            Outcome::Clean
        }
    }

    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Clean | Outcome::Planned => 0,
            Outcome::ItemFailures | Outcome::Cancelled => 1,
        }
    }
}

/// Exit code for a fatal error or invalid configuration.
pub const FATAL_EXIT_CODE: u8 = 2;

/// Async CLI entrypoint for main() and integration tests.
pub async fn run(cli: Cli) -> Result<Outcome> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync(args) => sync(args).await,
    }
}

async fn sync(args: SyncArgs) -> Result<Outcome> {
    let settings = resolve(&args)?;
    settings.sync.trace_loaded();

    let transport = ReqwestTransport::new(&settings.sync.fetch)
        .map_err(|e| anyhow!("Failed to build HTTP client: {e}"))?;
    let mut fetcher = Fetcher::new(transport, &settings.sync.fetch);
    let store = S3Store::connect(&settings.store).await;

    if args.dry_run {
        tracing::info!(command = "sync", dry_run = true, "Computing plan only");
        let plan = prepare_plan(&settings.sync, &mut fetcher, &store).await?;
        print_plan(&plan, args.json)?;
        return Ok(Outcome::Planned);
    }

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing the current action then stopping");
            on_interrupt.cancel();
        }
    });

    tracing::info!(command = "sync", "Starting synchronisation process");
    let summary = synchronise(&settings.sync, &mut fetcher, &store, &cancel).await?;
    print_summary(&summary, args.json)?;
    Ok(Outcome::from_summary(&summary))
}

fn print_plan(plan: &SyncPlan, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(plan)?);
        return Ok(());
    }
    for action in &plan.actions {
        match action {
            SyncAction::Upload { key, reason, .. } => println!("upload {key} ({reason:?})"),
            SyncAction::Skip { key, .. } => println!("skip   {key}"),
            SyncAction::Delete { key } => println!("delete {key}"),
        }
    }
    println!(
        "plan: {} to upload, {} unchanged, {} to delete",
        plan.uploads(),
        plan.skips(),
        plan.deletes()
    );
    Ok(())
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!(
        "uploaded {}, skipped {}, deleted {}, failed {}",
        summary.uploaded, summary.skipped, summary.deleted, summary.failed
    );
    for failure in &summary.failures {
        println!("  failed {} {}: {}", failure.action, failure.key, failure.error);
    }
    if summary.cancelled {
        println!("cancelled with {} actions not run", summary.not_run);
    }
    Ok(())
}
