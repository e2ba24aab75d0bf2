//! chainingest CLI: follow a chain over WebSocket and stream block events.
//!
//! # Commands
//! ```bash
//! chainingest run  --url ws://127.0.0.1:8546 --sync-mode fast --start 19000000
//! chainingest run  --config engine.json --resume 19000000
//! chainingest info
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use chainingest_core::config::{EngineConfig, SyncMode};
use chainingest_core::status::StatusHandle;
use chainingest_engine::EngineBuilder;

mod handlers;
mod logging;

use handlers::{LogConnector, TxCountProcessor};
use logging::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "chainingest",
    about = "Block ingestion engine: historical sync, live heads, fork detection",
    long_about = "
ChainIngest replays a range of blocks from an EVM node, then follows new
heads, flagging blocks whose parent does not match the one it saw.

Events are written to the log as JSON lines (target chainingest::events).
RUST_LOG overrides --log-level and --log.
",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, replay history, then follow new heads
    Run(RunArgs),

    /// Show defaults and build info
    Info,
}

#[derive(Args)]
struct RunArgs {
    /// JSON engine configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Node WebSocket URL
    #[arg(long)]
    url: Option<String>,

    /// Historical sync mode: normal | fast
    #[arg(long)]
    sync_mode: Option<SyncMode>,

    /// Concurrent workers per fast-sync chunk
    #[arg(long)]
    pool: Option<usize>,

    /// Heights per fast-sync worker
    #[arg(long)]
    size: Option<usize>,

    /// Fork window length
    #[arg(long)]
    max_fork_size: Option<usize>,

    /// First height to replay
    #[arg(long, conflicts_with = "resume")]
    start: Option<String>,

    /// Last height already processed; replay resumes right after it
    #[arg(long)]
    resume: Option<String>,

    /// Last height to replay (0 = chain head)
    #[arg(long)]
    end: Option<String>,

    /// Seconds between status log lines (0 = never)
    #[arg(long, default_value_t = 30)]
    status_interval: u64,

    /// Global log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Per-component log level, e.g. --log chainingest-rpc=debug
    #[arg(long = "log")]
    log_overrides: Vec<String>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Info => {
            cmd_info();
            Ok(())
        }
    }
}

fn load_config(args: &RunArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    if let Some(mode) = args.sync_mode {
        config.sync_mode = mode;
    }
    if let Some(pool) = args.pool {
        config.sync_thread_pool = pool;
    }
    if let Some(size) = args.size {
        config.sync_thread_size = size;
    }
    if let Some(max) = args.max_fork_size {
        config.max_fork_size = max;
    }
    Ok(config)
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    init_tracing(
        &LogConfig {
            level: args.log_level.clone(),
            json: args.json_logs,
            ..Default::default()
        }
        .with_overrides(&args.log_overrides),
    );

    let config = load_config(&args)?;
    let mut engine = EngineBuilder::from_config(config)
        .connector(Arc::new(LogConnector))
        .processor(Arc::new(TxCountProcessor))
        .build()?;
    if let Some(start) = &args.start {
        engine.set_start(start, false)?;
    }
    if let Some(resume) = &args.resume {
        engine.set_start(resume, true)?;
    }
    if let Some(end) = &args.end {
        engine.set_end(end)?;
    }

    if args.status_interval > 0 {
        tokio::spawn(report_status(
            engine.status_handle(),
            Duration::from_secs(args.status_interval),
        ));
    }

    let range = engine.range();
    tracing::info!(
        url = %engine.config().url,
        mode = %engine.config().sync_mode,
        start = %range.start,
        end = %range.end,
        "Starting engine"
    );

    if let Err(e) = engine.run().await {
        tracing::error!(error = %e, state = %engine.state(), "Engine stopped");
        std::process::exit(1);
    }
    Ok(())
}

async fn report_status(status: StatusHandle, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let snapshot = status.snapshot();
        tracing::info!(
            connected = snapshot.connected,
            sync = %snapshot.sync_label(),
            current = %snapshot.current,
            "Status"
        );
    }
}

fn cmd_info() {
    let defaults = EngineConfig::default();
    println!("ChainIngest v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default node URL:        {}", defaults.url);
    println!("  Default sync mode:       {}", defaults.sync_mode);
    println!(
        "  Fast sync chunk:         {} workers x {} blocks",
        defaults.sync_thread_pool, defaults.sync_thread_size
    );
    println!("  Fork window:             {} blocks", defaults.max_fork_size);
    println!("  Connect retry delay:     {} ms", defaults.connect_retry_ms);
    println!("  Transport:               WebSocket JSON-RPC (eth_subscribe newHeads)");
}
