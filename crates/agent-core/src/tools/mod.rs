pub mod accumulator;
pub mod executor;
pub mod registry;
pub mod types;

pub use accumulator::{synthesize_call_id, PartialToolCall, ToolCallAccumulator};
pub use executor::{ToolError, ToolInvoker};
pub use registry::{RegistryError, SharedTool, Tool, ToolRegistry, ToolRegistryBuilder};
pub use types::{
    FunctionCall, FunctionSchema, ResolvedToolCall, ToolCall, ToolCallDelta, ToolFailureKind,
    ToolResult, ToolSchema,
};
