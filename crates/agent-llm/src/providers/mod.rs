//! LLM Providers

pub(crate) mod common;
pub mod openai;
pub mod scripted;

pub use openai::OpenAIProvider;
pub use scripted::{ScriptedProvider, ScriptedStep};
