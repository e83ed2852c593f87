use anyhow::Context;
use clap::{Parser, Subcommand};
use resume_gateway::GatewayConfig;
use std::path::PathBuf;

/// Resume Vault CLI - inspect, restore and serve a versioned resume
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file (default: resume.db)
    #[arg(short, long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Configuration file (.json or .toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

mod mcp;

#[derive(Subcommand)]
enum Commands {
    /// Print the current resume
    Get,

    /// List stored versions, newest first
    Versions {
        /// Output in JSON format for integrations
        #[arg(long)]
        json: bool,
    },

    /// Print the contents of one version
    Show {
        /// Version filename as listed by `versions`
        filename: String,
    },

    /// Restore the resume from a version
    Restore {
        /// Version filename as listed by `versions`
        filename: String,

        /// Shared secret
        #[arg(long, env = "API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Start the MCP (Model Context Protocol) server on stdio
    Mcp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Logs go to stderr; stdout belongs to command output and the MCP protocol
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = load_config(&cli)?;
    let server = resume_gateway::build_server(&config)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    let service = server.service().clone();

    match cli.command {
        Commands::Get => {
            let resume = service.get_resume()?;
            println!("{}", serde_json::to_string_pretty(&resume)?);
        }
        Commands::Versions { json } => {
            let versions = service.list_versions()?;
            if json {
                println!("{}", serde_json::to_string(&versions)?);
            } else if versions.is_empty() {
                println!("No versions stored yet.");
            } else {
                for version in &versions {
                    println!("{}  {}", version.created_at.to_rfc3339(), version.name);
                }
            }
        }
        Commands::Show { filename } => {
            let snapshot = service.get_version(&filename)?;
            println!("{}", serde_json::to_string_pretty(&snapshot.data)?);
        }
        Commands::Restore { filename, api_key } => {
            let api_key = api_key.or_else(|| config.api_key.clone());
            let restored = service.restore_version(&filename, api_key.as_deref())?;
            println!("Restored from {}", filename);
            println!("Previous resume saved as {}", restored.pre_restore);
        }
        Commands::Mcp => {
            if !config.has_api_key() {
                tracing::warn!("No API key configured; update, patch and restore will be rejected");
            }
            mcp::run_server(server).await?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<GatewayConfig> {
    let config = match &cli.config {
        Some(path) => GatewayConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    let mut config = config.apply_env()?;
    if let Some(path) = &cli.database {
        config = config.with_database_path(path.clone());
    }
    Ok(config)
}
