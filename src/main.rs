//! forward-mult - forward-multiplicity event reduction
//!
//! Reduces raw forward-detector readout, one event at a time, into
//! per-event d²N/dηdφ records plus run-level accumulators.
//!
//! # Usage
//!
//! ```bash
//! # Replay a JSONL event file
//! forward-mult --events run_244918.jsonl --output summary.json
//!
//! # Pipe from the simulation binary
//! forward-mult-sim --events 10000 --system pbpb | forward-mult --stdin
//!
//! # Persist per-event records alongside the summary
//! forward-mult --events run.jsonl --store records.db
//! ```
//!
//! # Environment Variables
//!
//! - `FORWARD_MULT_CONFIG`: Path to the TOML run configuration
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use forward_mult::config::{self, RunConfig};
use forward_mult::output::RunSummary;
use forward_mult::pipeline::{EventPipeline, RunLoop};
use forward_mult::source::{EventSource, JsonlSource, StdinSource};
use forward_mult::store::RecordStore;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "forward-mult")]
#[command(about = "Forward-multiplicity event reduction pipeline")]
#[command(version)]
struct CliArgs {
    /// Path to a JSONL event file to replay
    #[arg(long, value_name = "FILE")]
    events: Option<PathBuf>,

    /// Read JSON events from stdin (one per line) instead of a file
    #[arg(long)]
    stdin: bool,

    /// Path for the end-of-run JSON summary
    #[arg(long, default_value = "run_summary.json")]
    output: PathBuf,

    /// Persist per-event records to this store directory
    #[arg(long, value_name = "DIR")]
    store: Option<PathBuf>,

    /// Explicit run configuration file (overrides the default search)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let cfg = match &args.config {
        Some(path) => RunConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => RunConfig::load(),
    };
    config::init(cfg);
    let cfg = config::get();

    info!(
        vertex_bins = cfg.inspector.vertex_axis.bins,
        low_flux = cfg.run.enable_low_flux,
        timing = cfg.timing.enabled,
        "configuration loaded"
    );

    let pipeline = EventPipeline::new(cfg);

    let cancel_token = CancellationToken::new();
    {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing current event");
                token.cancel();
            }
        });
    }

    let mut run_loop = RunLoop::new(pipeline, cancel_token);
    if let Some(store_path) = &args.store {
        let store = RecordStore::open(store_path)
            .with_context(|| format!("opening record store at {}", store_path.display()))?;
        run_loop = run_loop.with_store(store);
    }

    let pipeline = if args.stdin {
        let mut source = StdinSource::new();
        run_loop.run(&mut source).await
    } else if let Some(path) = &args.events {
        let mut source = JsonlSource::open(path)
            .await
            .with_context(|| format!("opening event file {}", path.display()))?;
        run_loop.run(&mut source).await
    } else {
        bail!("no input: pass --events <FILE> or --stdin");
    };

    let summary = RunSummary::from_pipeline(&pipeline);
    summary
        .write_json(&args.output)
        .with_context(|| format!("writing summary to {}", args.output.display()))?;
    info!(
        output = %args.output.display(),
        stats = %summary.stats,
        "summary written"
    );

    Ok(())
}
