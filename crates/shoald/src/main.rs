//! shoald: the Shoal daemon.
//!
//! Single binary that assembles the Shoal subsystems:
//! - State store (redb)
//! - Scheduler + local task executor
//! - REST API
//!
//! # Usage
//!
//! ```text
//! shoald standalone --port 8080 --data-dir /var/lib/shoal
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::DaemonConfig;

const DEFAULT_LOG_FILTER: &str = "info,shoald=debug,shoal=debug";

#[derive(Parser)]
#[command(name = "shoald", about = "Shoal daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run in standalone mode (single node, in-process task executor).
    Standalone {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/shoal")]
        data_dir: PathBuf,

        /// Optional shoald.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Simulated task launch latency in milliseconds.
        #[arg(long)]
        launch_latency_ms: Option<u64>,

        /// Emit logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Standalone {
            port,
            data_dir,
            config,
            launch_latency_ms,
            log_json,
        } => {
            init_tracing(log_json);

            let mut daemon_config = match &config {
                Some(path) => DaemonConfig::from_file(path)?,
                None => DaemonConfig::default(),
            };
            if let Some(ms) = launch_latency_ms {
                daemon_config.executor.launch_latency_ms = ms;
            }
            run_standalone(port, data_dir, daemon_config).await
        }
    }
}

async fn run_standalone(port: u16, data_dir: PathBuf, config: DaemonConfig) -> anyhow::Result<()> {
    info!("Shoal daemon starting in standalone mode");

    // Ensure data directory exists.
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("shoal.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let state = shoal_state::StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let executor_config = config.executor_config();
    info!(
        launch_latency = ?executor_config.launch_latency,
        retire_latency = ?executor_config.retire_latency,
        "local executor initialized"
    );
    let executor = Arc::new(shoal_scheduler::LocalExecutor::new(executor_config));

    let scheduler = shoal_scheduler::Scheduler::new(state, executor);
    let restored = scheduler.restore().await?;
    info!(restored, "scheduler initialized");

    // ── Start API server ───────────────────────────────────────

    let api_state = shoal_api::ApiState {
        scheduler,
        remove_timeout: config.remove_timeout(),
    };
    let router = shoal_api::build_router(api_state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
        })
        .await?;

    info!("Shoal daemon stopped");
    Ok(())
}
