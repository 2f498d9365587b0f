//! Connect to configured MCP servers and expose their tools.

use std::sync::Arc;

use agent_core::tools::{RegistryError, ToolRegistryBuilder};
use tokio::sync::mpsc;

use crate::config::{McpConfig, McpServerConfig};
use crate::error::Result;
use crate::protocol::{McpProtocolClient, McpToolInfo, McpTransport};
use crate::tool::McpRemoteTool;
use crate::transports::SseTransport;

/// An initialised session with one MCP server.
pub struct McpServerConnection {
    config: McpServerConfig,
    client: Arc<McpProtocolClient>,
    tools: Vec<McpToolInfo>,
}

impl McpServerConnection {
    pub async fn connect(config: McpServerConfig) -> Result<Self> {
        let (transport, inbound) = SseTransport::connect(&config).await?;
        Self::handshake(config, Box::new(transport), inbound).await
    }

    /// Run `initialize` and `tools/list` over an established transport.
    pub async fn handshake(
        config: McpServerConfig,
        transport: Box<dyn McpTransport>,
        inbound: mpsc::Receiver<String>,
    ) -> Result<Self> {
        let client = McpProtocolClient::new(transport, inbound);

        let init = client.initialize(config.request_timeout()).await?;
        log::info!(
            "MCP server '{}' initialized: {} v{}",
            config.id,
            init.server_info.name,
            init.server_info.version
        );

        let tools = client.list_tools(config.request_timeout()).await?;
        log::info!("MCP server '{}' has {} tools", config.id, tools.len());

        Ok(Self {
            config,
            client: Arc::new(client),
            tools,
        })
    }

    pub fn server_id(&self) -> &str {
        &self.config.id
    }

    /// Remote tools that pass the server's allow and deny lists.
    pub fn remote_tools(&self) -> Vec<McpRemoteTool> {
        self.tools
            .iter()
            .filter(|tool| {
                let allowed = self.config.is_tool_allowed(&tool.name);
                if !allowed {
                    log::debug!("[{}] Tool '{}' filtered out", self.config.id, tool.name);
                }
                allowed
            })
            .map(|tool| {
                McpRemoteTool::new(
                    self.config.id.clone(),
                    tool.clone(),
                    self.client.clone(),
                    self.config.request_timeout(),
                )
            })
            .collect()
    }
}

/// Connect to every enabled server. Servers that fail are logged and skipped.
pub async fn discover_tools(config: &McpConfig) -> Vec<McpRemoteTool> {
    let mut tools = Vec::new();
    for server in config.enabled_servers() {
        match McpServerConnection::connect(server.clone()).await {
            Ok(connection) => tools.extend(connection.remote_tools()),
            Err(e) => log::error!("Failed to start MCP server '{}': {}", server.id, e),
        }
    }
    tools
}

/// Add remote tools to `registry`; names already taken keep their first owner.
///
/// Returns how many were registered.
pub fn register_remote_tools(
    registry: &mut ToolRegistryBuilder,
    tools: Vec<McpRemoteTool>,
) -> usize {
    let mut registered = 0;
    for tool in tools {
        let server_id = tool.server_id().to_string();
        match registry.register(tool) {
            Ok(()) => registered += 1,
            Err(RegistryError::DuplicateTool(name)) => log::warn!(
                "[{}] Skipping MCP tool '{}': name already registered",
                server_id,
                name
            ),
            Err(e) => log::warn!("[{}] Skipping MCP tool: {}", server_id, e),
        }
    }
    registered
}

pub async fn register_mcp_tools(
    registry: &mut ToolRegistryBuilder,
    config: &McpConfig,
) -> usize {
    let tools = discover_tools(config).await;
    let registered = register_remote_tools(registry, tools);
    log::info!("Registered {} MCP tools", registered);
    registered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::client::test_support::{math_server, ScriptedTransport};
    use agent_core::tools::Tool;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn math_connection(config: McpServerConfig) -> McpServerConnection {
        let (transport, inbound) = ScriptedTransport::new(math_server);
        McpServerConnection::handshake(config, Box::new(transport), inbound)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn handshake_lists_remote_tools() {
        let connection = math_connection(McpServerConfig::new("math", "http://unused/sse")).await;

        let names: Vec<String> = connection
            .remote_tools()
            .iter()
            .map(|tool| tool.name().to_string())
            .collect();

        assert_eq!(connection.server_id(), "math");
        assert_eq!(names, vec!["add", "divide"]);
    }

    #[tokio::test]
    async fn deny_list_filters_tools() {
        let mut config = McpServerConfig::new("math", "http://unused/sse");
        config.denied_tools = vec!["divide".to_string()];

        let connection = math_connection(config).await;

        assert_eq!(connection.remote_tools().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_names_keep_first_registration() {
        struct LocalAdd;

        #[async_trait::async_trait]
        impl Tool for LocalAdd {
            fn name(&self) -> &str {
                "add"
            }
            fn description(&self) -> &str {
                "local add"
            }
            fn parameters_schema(&self) -> serde_json::Value {
                json!({"type": "object"})
            }
            async fn execute(
                &self,
                _args: serde_json::Value,
            ) -> std::result::Result<serde_json::Value, agent_core::tools::ToolError> {
                Ok(json!("local"))
            }
        }

        let mut builder = ToolRegistryBuilder::new();
        builder.register(LocalAdd).unwrap();
        let connection = math_connection(McpServerConfig::new("math", "http://unused/sse")).await;

        let registered = register_remote_tools(&mut builder, connection.remote_tools());

        assert_eq!(registered, 1);
        let registry = builder.build();
        assert_eq!(registry.len(), 2);
        let add = registry.get("add").unwrap();
        assert_eq!(add.description(), "local add");
    }

    #[tokio::test]
    async fn unreachable_server_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = McpConfig {
            servers: vec![
                McpServerConfig::new("broken", format!("{}/sse", server.uri())),
                McpServerConfig {
                    enabled: false,
                    ..McpServerConfig::new("off", "http://127.0.0.1:9/sse")
                },
            ],
        };
        let mut builder = ToolRegistryBuilder::new();

        let registered = register_mcp_tools(&mut builder, &config).await;

        assert_eq!(registered, 0);
        assert!(builder.is_empty());
    }
}
