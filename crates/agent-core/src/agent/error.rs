use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Tool result for '{0}' does not answer a pending tool call")]
    UnexpectedToolResult(String),

    #[error("Tool calls still unanswered: {0:?}")]
    UnansweredToolCalls(Vec<String>),

    #[error("System message can only open the conversation")]
    MisplacedSystemMessage,
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Unsupported role: {0}")]
    UnsupportedRole(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Conversation error: {0}")]
    Conversation(#[from] ConversationError),

    #[error("Cancelled")]
    Cancelled,
}
