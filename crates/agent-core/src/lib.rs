pub mod agent;
pub mod tools;

pub use agent::{
    AgentError, AgentEvent, ChatInput, CompletionReason, Conversation, ConversationError,
    Message, Role, ValidatedInput,
};
pub use tools::{
    ResolvedToolCall, Tool, ToolCall, ToolCallAccumulator, ToolCallDelta, ToolError,
    ToolFailureKind, ToolInvoker, ToolRegistry, ToolRegistryBuilder, ToolResult, ToolSchema,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
