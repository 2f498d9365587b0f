use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call as it appears on an assistant message (OpenAI wire shape).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One incremental piece of an in-progress tool call.
///
/// Every field except `slot` is optional: providers send the call id, the
/// name and the argument text on independent deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallDelta {
    pub slot: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

impl ToolCallDelta {
    pub fn new(slot: u32) -> Self {
        Self {
            slot,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }
}

/// A tool call whose argument text parsed as a complete value. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedToolCall {
    pub slot: u32,
    pub id: String,
    pub name: String,
    pub arguments: Value,
    /// The exact argument text the model produced.
    pub raw_arguments: String,
}

impl ResolvedToolCall {
    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall {
            id: self.id.clone(),
            tool_type: "function".to_string(),
            function: FunctionCall {
                name: self.name.clone(),
                arguments: self.raw_arguments.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureKind {
    UnknownTool,
    ResourceUnavailable,
    InvocationError,
    Timeout,
}

/// Outcome of invoking a [`ResolvedToolCall`]. A failure still answers the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success {
        value: Value,
    },
    Failure {
        kind: ToolFailureKind,
        message: String,
    },
}

impl ToolResult {
    pub fn success(value: Value) -> Self {
        Self::Success { value }
    }

    pub fn failure(kind: ToolFailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The value recorded in the conversation: the success value, or `null`.
    pub fn value(&self) -> Value {
        match self {
            Self::Success { value } => value.clone(),
            Self::Failure { .. } => Value::Null,
        }
    }

    pub fn failure_kind(&self) -> Option<ToolFailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}
