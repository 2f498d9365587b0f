pub mod provider;
pub mod providers;
pub mod types;

pub use provider::{LLMError, LLMProvider, LLMStream};
pub use providers::{OpenAIProvider, ScriptedProvider, ScriptedStep};
pub use types::LLMChunk;
