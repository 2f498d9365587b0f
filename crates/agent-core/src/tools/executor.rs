use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::tools::{ResolvedToolCall, ToolFailureKind, ToolRegistry, ToolResult};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The channel to the capability closed before it answered.
    #[error("Tool unavailable: {0}")]
    Unavailable(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, ToolError>;

impl ToolError {
    pub fn failure_kind(&self) -> ToolFailureKind {
        match self {
            ToolError::NotFound(_) => ToolFailureKind::UnknownTool,
            ToolError::Unavailable(_) => ToolFailureKind::ResourceUnavailable,
            ToolError::Execution(_) | ToolError::InvalidArguments(_) => {
                ToolFailureKind::InvocationError
            }
            ToolError::Timeout(_) => ToolFailureKind::Timeout,
        }
    }
}

/// Runs resolved calls against a registry. Never fails: every outcome,
/// including an unknown tool, comes back as a [`ToolResult`].
#[derive(Clone)]
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub async fn invoke(&self, call: &ResolvedToolCall) -> ToolResult {
        match self.try_invoke(call).await {
            Ok(value) => {
                log::debug!("Tool '{}' ({}) succeeded", call.name, call.id);
                ToolResult::success(value)
            }
            Err(error) => {
                log_failure(call, &error);
                ToolResult::failure(error.failure_kind(), error.to_string())
            }
        }
    }

    async fn try_invoke(&self, call: &ResolvedToolCall) -> Result<serde_json::Value> {
        let tool = self
            .registry
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let execution = tool.execute(call.arguments.clone());
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, execution)
                .await
                .map_err(|_| ToolError::Timeout(limit))?,
            None => execution.await,
        }
    }
}

fn log_failure(call: &ResolvedToolCall, error: &ToolError) {
    match error {
        ToolError::Unavailable(reason) => log::warn!(
            "Tool '{}' ({}) produced no answer, channel closed: {}",
            call.name,
            call.id,
            reason
        ),
        ToolError::Timeout(limit) => log::warn!(
            "Tool '{}' ({}) did not answer within {:?}",
            call.name,
            call.id,
            limit
        ),
        ToolError::NotFound(_) => log::error!(
            "Model requested unknown tool '{}' ({})",
            call.name,
            call.id
        ),
        ToolError::Execution(_) | ToolError::InvalidArguments(_) => log::error!(
            "Tool '{}' ({}) failed: {}",
            call.name,
            call.id,
            error
        ),
    }
}
