//! Seqmine Server Binary
//!
//! Starts the backend: loads configuration, restores the submission log
//! from its checkpoint, spawns the crawler and maintenance loops, and
//! serves the HTTP API until SIGINT/SIGTERM.
//!
//! ## Usage
//!
//! ```bash
//! # Start with config.toml / environment defaults
//! cargo run --bin seqmine-server
//!
//! # Start with explicit overrides
//! cargo run --bin seqmine-server -- --config /etc/seqmine.toml --port 8080
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use seqmine::http::{start_http_server, AppState};
use seqmine::scheduler::spawn_background_tasks;
use seqmine::Config;

#[derive(Parser, Debug)]
#[command(name = "seqmine-server", version, about = "Program-mining backend server")]
struct Args {
    /// Configuration file path (defaults to config.toml + config.local.toml)
    #[arg(long)]
    config: Option<String>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<std::path::PathBuf>,
}

fn init_tracing(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    if let Some(dir) = &config.logging.dir {
        let appender = tracing_appender::rolling::daily(dir, "seqmine.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        return Some(guard);
    }
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => Config::load().unwrap_or_else(|err| {
            eprintln!("Using default configuration ({err})");
            Config::default()
        }),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }

    let _log_guard = init_tracing(&config);
    info!(
        data_dir = %config.storage.data_dir.display(),
        crawler = config.crawler.enabled,
        "starting seqmine backend"
    );

    std::fs::create_dir_all(&config.storage.data_dir)
        .with_context(|| format!("cannot create {}", config.storage.data_dir.display()))?;

    let server_config = config.server.clone();
    let state = Arc::new(AppState::from_config(config));
    let (shutdown_tx, handles) = spawn_background_tasks(&state);

    let result = start_http_server(Arc::clone(&state), &server_config).await;

    // Stop the background loops and let them wind down.
    let _ = shutdown_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }

    result.map_err(|err| anyhow::anyhow!(err))
}
