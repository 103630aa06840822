//! Atlas - terminal chat client for the ATLAS assistant.

use anyhow::{Context, Result};
use atlas_cli::{config, logging, repl};
use atlas_core::{ChatSession, WsConnector};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use config::Config;
use logging::{LogConfig, LogFormat};

/// Atlas - chat with the ATLAS assistant from a terminal.
#[derive(Parser, Debug)]
#[command(name = "atlas")]
#[command(about = "Streaming chat client for the ATLAS assistant")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the dashboard origin from config (e.g. https://dash.example.com)
    #[arg(short, long)]
    origin: Option<String>,

    /// Enable verbose logging (INFO level for most targets)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging (DEBUG level, stream folding stays at INFO)
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long)]
    trace: bool,

    /// Quiet mode (ERROR only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "transport=debug" or "protocol=trace")
    /// Can be specified multiple times. Targets are prefixed with "atlas::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    // TLS for wss:// origins; an already-installed provider is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load()?,
    };

    if let Some(origin) = cli.origin {
        config.origin = origin;
    }

    tracing::info!(target: "atlas::startup", "Loaded configuration (origin: {})", config.origin);

    let handle = ChatSession::start(config.session_config(), Arc::new(WsConnector))?;
    repl::run(handle).await
}
