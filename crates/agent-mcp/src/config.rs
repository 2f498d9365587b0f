use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{McpError, Result};

/// Root MCP configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

impl McpConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: McpConfig = serde_json::from_str(raw)
            .map_err(|e| McpError::InvalidConfig(format!("invalid MCP config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            McpError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn enabled_servers(&self) -> impl Iterator<Item = &McpServerConfig> {
        self.servers.iter().filter(|server| server.enabled)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for server in &self.servers {
            if server.id.trim().is_empty() {
                return Err(McpError::InvalidConfig("server id must not be empty".to_string()));
            }
            if server.url.trim().is_empty() {
                return Err(McpError::InvalidConfig(format!(
                    "server '{}' has no url",
                    server.id
                )));
            }
            if !seen.insert(server.id.as_str()) {
                return Err(McpError::InvalidConfig(format!(
                    "duplicate server id '{}'",
                    server.id
                )));
            }
        }
        Ok(())
    }
}

/// Single MCP server reached over SSE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Unique identifier for this server
    pub id: String,
    /// SSE endpoint URL, e.g. `http://localhost:8000/sse`
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Additional headers sent on the SSE and POST requests
    #[serde(default)]
    pub headers: Vec<HeaderConfig>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Empty means every tool is allowed
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub denied_tools: Vec<String>,
}

impl McpServerConfig {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            enabled: true,
            headers: Vec::new(),
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            allowed_tools: Vec::new(),
            denied_tools: Vec::new(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn is_tool_allowed(&self, tool_name: &str) -> bool {
        if !self.allowed_tools.is_empty() && !self.allowed_tools.iter().any(|t| t == tool_name) {
            return false;
        }
        !self.denied_tools.iter().any(|t| t == tool_name)
    }
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    60000 // 60 seconds
}

fn default_connect_timeout() -> u64 {
    10000 // 10 seconds
}

/// HTTP header configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderConfig {
    pub name: String,
    pub value: String,
}
