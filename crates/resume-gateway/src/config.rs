//! Gateway configuration
//!
//! Resolution order, lowest to highest: defaults, config file (`.json` or
//! `.toml`), environment (optionally seeded from `.env`), command-line flags.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::{GatewayError, Result, DEFAULT_DB_PATH, DEFAULT_HOST, DEFAULT_PORT};

/// Main gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Shared secret for mutating tools; unset means mutations are rejected
    pub api_key: Option<String>,

    /// Identity announced in the MCP `initialize` handshake
    pub server: ServerInfo,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            api_key: None,
            server: ServerInfo::default(),
        }
    }
}

/// MCP server identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "resume-mcp".to_string(),
            version: crate::VERSION.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database file
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Set the shared secret
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| GatewayError::InvalidConfig(format!("bad listen address: {}", e)))
    }

    /// Load configuration from a `.json` or `.toml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") | None => Ok(serde_json::from_str(&content)?),
            Some(other) => Err(GatewayError::InvalidConfig(format!(
                "unsupported config format: .{}",
                other
            ))),
        }
    }

    /// Save configuration to a JSON file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay values from the process environment
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`
    ///
    /// Reads `RESUME_DB_PATH`, `API_KEY`, `HOST`, `PORT`, `MCP_NAME` and
    /// `MCP_VERSION`. Empty values are ignored.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = var("RESUME_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(key) = var("API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(host) = var("HOST") {
            self.host = host;
        }
        if let Some(port) = var("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| GatewayError::InvalidConfig(format!("PORT is not a port: {}", port)))?;
        }
        if let Some(name) = var("MCP_NAME") {
            self.server.name = name;
        }
        if let Some(version) = var("MCP_VERSION") {
            self.server.version = version;
        }
        Ok(self)
    }

    /// Whether a usable shared secret is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .map_or(false, |key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, DEFAULT_HOST);
        assert!(!config.has_api_key());
        assert_eq!(config.server.name, "resume-mcp");
    }

    #[test]
    fn test_config_builder() {
        let config = GatewayConfig::new()
            .with_host("127.0.0.1")
            .with_port(8080)
            .with_database_path("/tmp/r.db")
            .with_api_key("k");

        assert_eq!(config.socket_addr().unwrap().port(), 8080);
        assert_eq!(config.database_path, PathBuf::from("/tmp/r.db"));
        assert!(config.has_api_key());
    }

    #[test]
    fn test_bad_socket_addr() {
        let config = GatewayConfig::new().with_host("not a host");
        assert!(matches!(config.socket_addr(), Err(GatewayError::InvalidConfig(_))));
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            ("API_KEY", "from-env"),
            ("PORT", "4000"),
            ("MCP_NAME", "my-resume"),
            ("HOST", "  "),
        ]
        .into_iter()
        .collect();

        let config = GatewayConfig::default()
            .apply_env_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.port, 4000);
        assert_eq!(config.server.name, "my-resume");
        assert_eq!(config.host, DEFAULT_HOST, "blank values are ignored");
    }

    #[test]
    fn test_env_bad_port() {
        let result = GatewayConfig::default()
            .apply_env_from(|key| (key == "PORT").then(|| "eighty".to_string()));
        assert!(matches!(result, Err(GatewayError::InvalidConfig(_))));
    }

    #[test]
    fn test_file_formats() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("gateway.json");
        let config = GatewayConfig::default().with_port(9090).with_api_key("abc");
        config.to_file(&json_path).unwrap();
        assert_eq!(GatewayConfig::from_file(&json_path).unwrap(), config);

        let toml_path = dir.path().join("gateway.toml");
        std::fs::write(
            &toml_path,
            "port = 7070\ndatabase_path = \"data/resume.db\"\n\n[server]\nname = \"cv\"\n",
        )
        .unwrap();
        let loaded = GatewayConfig::from_file(&toml_path).unwrap();
        assert_eq!(loaded.port, 7070);
        assert_eq!(loaded.server.name, "cv");
        assert_eq!(loaded.server.version, crate::VERSION);
        assert_eq!(loaded.host, DEFAULT_HOST);

        let yaml_path = dir.path().join("gateway.yaml");
        std::fs::write(&yaml_path, "port: 1").unwrap();
        assert!(GatewayConfig::from_file(&yaml_path).is_err());
    }
}
