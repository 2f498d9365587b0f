use std::time::Duration;

use agent_core::tools::ToolError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum McpError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Server disconnected")]
    Disconnected,
}

impl McpError {
    /// Classify a failed remote call for the tool invoker.
    ///
    /// A lost channel is a resource problem; anything the server answered
    /// with is an invocation error.
    pub fn into_tool_error(self, request_timeout: Duration) -> ToolError {
        match self {
            McpError::Disconnected | McpError::Connection(_) | McpError::Transport(_) => {
                ToolError::Unavailable(self.to_string())
            }
            McpError::Timeout(_) => ToolError::Timeout(request_timeout),
            McpError::Protocol(_)
            | McpError::ToolExecution(_)
            | McpError::Serialization(_)
            | McpError::InvalidConfig(_) => ToolError::Execution(self.to_string()),
        }
    }
}

impl From<serde_json::Error> for McpError {
    fn from(e: serde_json::Error) -> Self {
        McpError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for McpError {
    fn from(e: std::io::Error) -> Self {
        McpError::Transport(e.to_string())
    }
}

impl From<reqwest::Error> for McpError {
    fn from(e: reqwest::Error) -> Self {
        McpError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_channel_maps_to_unavailable() {
        let timeout = Duration::from_secs(1);
        assert!(matches!(
            McpError::Disconnected.into_tool_error(timeout),
            ToolError::Unavailable(_)
        ));
        assert!(matches!(
            McpError::Transport("reset".into()).into_tool_error(timeout),
            ToolError::Unavailable(_)
        ));
    }

    #[test]
    fn server_side_failures_map_to_execution() {
        let timeout = Duration::from_secs(1);
        assert!(matches!(
            McpError::ToolExecution("bad input".into()).into_tool_error(timeout),
            ToolError::Execution(msg) if msg.contains("bad input")
        ));
        assert!(matches!(
            McpError::Protocol("-32602: Invalid params".into()).into_tool_error(timeout),
            ToolError::Execution(_)
        ));
    }

    #[test]
    fn request_timeout_keeps_its_duration() {
        let timeout = Duration::from_millis(250);
        assert_eq!(
            McpError::Timeout("request 3".into()).into_tool_error(timeout),
            ToolError::Timeout(timeout)
        );
    }
}
