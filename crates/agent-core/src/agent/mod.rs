pub mod conversation;
pub mod error;
pub mod events;
pub mod input;
pub mod types;

pub use conversation::Conversation;
pub use error::{AgentError, ConversationError};
pub use events::{AgentEvent, CompletionReason};
pub use input::{ChatInput, HistoryEntry, InputMessage, ValidatedInput};
pub use types::{Message, Role};
