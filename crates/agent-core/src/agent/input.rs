use serde::Deserialize;

use crate::agent::{AgentError, Message};

/// Body of a chat request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatInput {
    pub message: InputMessage,
    #[serde(default)]
    pub previous_messages: Vec<HistoryEntry>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// The new message. Older clients send the user's text as a bare string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InputMessage {
    Text(String),
    Entry(HistoryEntry),
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub text: String,
}

/// A validated request, ready to drive one turn.
#[derive(Debug, Clone)]
pub struct ValidatedInput {
    pub user_message: String,
    pub history: Vec<Message>,
}

impl HistoryEntry {
    fn into_message(self) -> Result<Message, AgentError> {
        match self.role.as_str() {
            "user" => Ok(Message::user(self.text)),
            "assistant" => Ok(Message::assistant(self.text, Vec::new())),
            _ => Err(AgentError::UnsupportedRole(self.role)),
        }
    }
}

impl ChatInput {
    /// Check every role before anything is streamed.
    ///
    /// The new message must come from the user; history may contain user
    /// and assistant entries only.
    pub fn validate(self) -> Result<ValidatedInput, AgentError> {
        let user_message = match self.message {
            InputMessage::Text(text) => text,
            InputMessage::Entry(entry) if entry.role == "user" => entry.text,
            InputMessage::Entry(entry) => return Err(AgentError::UnsupportedRole(entry.role)),
        };

        if user_message.trim().is_empty() {
            return Err(AgentError::InvalidInput("message text is empty".to_string()));
        }

        let history = self
            .previous_messages
            .into_iter()
            .map(HistoryEntry::into_message)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidatedInput {
            user_message,
            history,
        })
    }
}
