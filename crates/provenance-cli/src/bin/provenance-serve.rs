//! provenance-serve - Key-gated HTTP service for training and classification
//!
//! Usage: provenance-serve [--config provenance.toml] [--bind 0.0.0.0:5000]

use anyhow::{Context, Result};
use clap::Parser;
use provenance_cli::server::{run_server, AppState};
use provenance_core::config::{ProvenanceConfig, ADMIN_KEY_ENV};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "provenance-serve")]
#[command(about = "Serve audio provenance training and classification over HTTP", long_about = None)]
struct Args {
    /// TOML configuration file (built-in defaults when absent)
    #[arg(short, long, default_value = "provenance.toml")]
    config: PathBuf,

    /// Override the configured bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The service always reports requests; verbose adds per-request debug lines
    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let mut config = ProvenanceConfig::load_or_default(&args.config)?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let admin_key = config.resolve_admin_key().with_context(|| {
        format!(
            "No admin key configured: set {} or admin_key in {}",
            ADMIN_KEY_ENV,
            args.config.display()
        )
    })?;

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.server.bind))?;

    log::info!(
        "Models in {}, scratch in {}, keys in {}",
        config.storage.model_dir.display(),
        config.storage.scratch_dir.display(),
        config.storage.key_file.display()
    );

    let state = AppState::from_config(&config, admin_key)?;
    run_server(state, addr).await
}
