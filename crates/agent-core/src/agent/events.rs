use crate::tools::ToolResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Token {
        content: String,
    },

    ToolStart {
        tool_call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    /// Emitted as soon as one invocation finishes, in completion order.
    ToolComplete {
        tool_call_id: String,
        tool_name: String,
        result: ToolResult,
    },

    Complete {
        rounds: usize,
        reason: CompletionReason,
    },

    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The last model pass produced no tool calls.
    Answered,
    /// The configured round cap was reached with tool results still unread.
    RoundLimit,
}
