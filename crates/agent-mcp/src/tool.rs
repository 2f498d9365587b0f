use std::sync::Arc;
use std::time::Duration;

use agent_core::tools::{Tool, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::protocol::{McpProtocolClient, McpToolInfo};

/// A tool that lives on an MCP server, callable through the local registry.
pub struct McpRemoteTool {
    server_id: String,
    info: McpToolInfo,
    client: Arc<McpProtocolClient>,
    request_timeout: Duration,
}

impl McpRemoteTool {
    pub fn new(
        server_id: impl Into<String>,
        info: McpToolInfo,
        client: Arc<McpProtocolClient>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            info,
            client,
            request_timeout,
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }
}

#[async_trait]
impl Tool for McpRemoteTool {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn description(&self) -> &str {
        &self.info.description
    }

    fn parameters_schema(&self) -> Value {
        self.info
            .input_schema
            .clone()
            .unwrap_or_else(|| json!({"type": "object", "properties": {}}))
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        log::debug!(
            "Calling MCP tool '{}' on server '{}'",
            self.info.name,
            self.server_id
        );

        self.client
            .call_tool(&self.info.name, args, self.request_timeout)
            .await
            .map_err(|e| e.into_tool_error(self.request_timeout))
    }
}
