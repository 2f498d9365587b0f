use agent_core::tools::ToolCallDelta;

#[derive(Debug, Clone, PartialEq)]
pub enum LLMChunk {
    Token(String),
    /// Tool-call fragments carried by one stream event, in wire order.
    ToolCallDeltas(Vec<ToolCallDelta>),
    Done,
}
