// Batch scanner binary
//
// Reads site batches from JSON, runs them on a recycled chromium fleet and
// prints `{results, summary}` to stdout. Logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use scanfleet::browser::profile;
use scanfleet::{
    ChromiumLauncher, FleetConfig, FleetError, FleetScheduler, NavigateScan, SiteBatch,
    SystemProcessControl,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "scanfleet", version, about = "Run scan batches on a self-healing browser fleet")]
struct Cli {
    /// JSON file holding an array of `{label, urls, settings}` batches
    #[arg(long)]
    batches: PathBuf,

    /// JSON config file; missing fields take their defaults
    #[arg(long, env = "SCANFLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Concurrent scan tasks per batch
    #[arg(long)]
    concurrency: Option<usize>,

    /// Show browser windows
    #[arg(long)]
    headful: bool,

    /// Debug logging and verbose health diagnostics
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let batches = load_batches(&cli.batches)?;
    let config = load_config(&cli)?;

    if config.purge_stale_profiles() {
        match profile::cleanup_stale_profiles(config.profile_prefix()) {
            Ok(count) if count > 0 => info!(count, "purged stale browser profiles"),
            Ok(_) => {}
            Err(e) => warn!("Stale profile purge failed: {e:#}"),
        }
    }

    let launcher = Arc::new(ChromiumLauncher::new(config.chromium_settings()));
    let os = Arc::new(SystemProcessControl::new());
    let mut scheduler = FleetScheduler::new(config, launcher, os, Arc::new(NavigateScan));

    let results = scheduler.run(batches).await;
    let shutdown = scheduler.shutdown().await;

    // a failed final cleanup still reports the run's totals
    let summary = match &shutdown {
        Ok(summary) => Some(summary),
        Err(FleetError::CleanupFailed { summary, .. }) => Some(summary.as_ref()),
        Err(_) => None,
    };
    let summary = serde_json::to_value(summary)?;
    let output = serde_json::json!({ "results": results, "summary": summary });
    println!("{}", serde_json::to_string_pretty(&output)?);

    match shutdown {
        Ok(_) => Ok(()),
        Err(e @ FleetError::CleanupFailed { .. }) => Err(e).context("final browser cleanup failed"),
        Err(e) => Err(e.into()),
    }
}

fn load_batches(path: &Path) -> Result<Vec<SiteBatch>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batches file: {}", path.display()))?;
    let batches: Vec<SiteBatch> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse batches file: {}", path.display()))?;
    Ok(batches)
}

fn load_config(cli: &Cli) -> Result<FleetConfig> {
    let base = match &cli.config {
        Some(path) => FleetConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => FleetConfig::default(),
    };

    let mut builder = base.into_builder();
    if let Some(width) = cli.concurrency {
        builder = builder.concurrency(width);
    }
    if cli.headful {
        builder = builder.headless(false);
    }
    if cli.verbose {
        builder = builder.verbose_diagnostics(true);
    }
    Ok(builder.build()?)
}
