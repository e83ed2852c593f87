//! Resume Gateway Binary
//!
//! Serves the resume store over HTTP with an MCP JSON-RPC endpoint.
//!
//! # Usage
//! ```bash
//! resume-gateway [--port 3000] [--host 0.0.0.0] [--database resume.db] [--config gateway.toml] [--verbose]
//! ```

use anyhow::Context;
use clap::Parser;
use resume_gateway::{Gateway, GatewayConfig};
use std::path::PathBuf;

/// Resume Gateway - versioned resume storage for AI agents
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Configuration file (.json or .toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Shared secret for mutating tools
    #[arg(long)]
    api_key: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }

    let config = load_config(&args)?;
    if !config.has_api_key() {
        tracing::warn!("No API key configured; update, patch and restore will be rejected");
    }

    let gateway = Gateway::from_config(config).context("failed to open resume database")?;
    gateway.start().await?;

    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<GatewayConfig> {
    let mut config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    config = config.apply_env()?;

    if let Some(host) = &args.host {
        config = config.with_host(host.clone());
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if let Some(path) = &args.database {
        config = config.with_database_path(path.clone());
    }
    if let Some(key) = &args.api_key {
        config = config.with_api_key(key.clone());
    }
    Ok(config)
}
