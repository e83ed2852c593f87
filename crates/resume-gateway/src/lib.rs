//! Resume Gateway - MCP and HTTP front ends for the resume store
//!
//! Exposes a [`resume_core::ResumeService`] to AI agents over the Model
//! Context Protocol, either as JSON-RPC over HTTP (`POST /mcp`) or through
//! the stdio loop in `resume-cli`.
//!
//! # Architecture
//!
//! ```text
//!   stdio (resume-cli mcp)      HTTP (resume-gateway)
//!            │                 /health  /status  /mcp
//!            └────────┬───────────────────┘
//!                     │
//!          ┌──────────▼──────────┐
//!          │     McpServer       │  JSON-RPC 2.0, tools/list, tools/call
//!          └──────────┬──────────┘
//!          ┌──────────▼──────────┐
//!          │   ResumeService     │  auth, validation, snapshots
//!          └──────────┬──────────┘
//!                  SQLite (WAL)
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod mcp;

pub use config::{GatewayConfig, ServerInfo};
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, GatewayState};
pub use mcp::{McpError, McpRequest, McpResponse, McpServer, Tool, ToolResult};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3000;

/// Default host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default SQLite database file
pub const DEFAULT_DB_PATH: &str = "resume.db";

/// Build the service and MCP server described by `config`
pub fn build_server(config: &GatewayConfig) -> Result<McpServer> {
    let guard = resume_core::ApiKeyGuard::new(config.api_key.as_deref());
    let service = resume_core::ResumeService::open(&config.database_path, guard)?;
    Ok(McpServer::new(service, config.server.clone()))
}
