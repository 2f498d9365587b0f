use serde_json::Value;
use uuid::Uuid;

use crate::agent::{ConversationError, Message, Role};
use crate::tools::ToolCall;

/// Ordered message history for one session.
///
/// The first entry is always the system message. Tool-result messages are
/// only accepted for calls announced by the latest assistant message, and
/// no new user or assistant turn can start while any of those calls is
/// still unanswered.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: String,
    system_prompt: String,
    messages: Vec<Message>,
    pending: Vec<String>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            id: Uuid::new_v4().to_string(),
            messages: vec![Message::system(system_prompt.clone())],
            system_prompt,
            pending: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Call ids from the latest assistant message that have no result yet.
    pub fn pending_calls(&self) -> &[String] {
        &self.pending
    }

    pub fn append_user(&mut self, text: impl Into<String>) -> Result<(), ConversationError> {
        self.ensure_answered()?;
        self.messages.push(Message::user(text));
        Ok(())
    }

    pub fn append_assistant(
        &mut self,
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Result<(), ConversationError> {
        self.ensure_answered()?;
        self.pending = tool_calls.iter().map(|call| call.id.clone()).collect();
        self.messages.push(Message::assistant(content, tool_calls));
        Ok(())
    }

    pub fn append_tool_result(
        &mut self,
        call_id: &str,
        value: &Value,
    ) -> Result<(), ConversationError> {
        self.take_pending(call_id)?;
        self.messages.push(Message::tool_result(call_id, value));
        Ok(())
    }

    /// Truncate history back to the system message.
    pub fn reset(&mut self) {
        self.messages.truncate(1);
        self.pending.clear();
    }

    /// Replace history with externally supplied messages.
    pub fn restore(&mut self, history: Vec<Message>) -> Result<(), ConversationError> {
        self.reset();
        for message in history {
            match message.role {
                Role::System => return Err(ConversationError::MisplacedSystemMessage),
                Role::User => self.append_user(message.content)?,
                Role::Assistant => self.append_assistant(message.content, message.tool_calls)?,
                Role::Tool => {
                    let call_id = message.tool_call_id.clone().unwrap_or_default();
                    self.take_pending(&call_id)?;
                    self.messages.push(message);
                }
            }
        }
        Ok(())
    }

    fn take_pending(&mut self, call_id: &str) -> Result<(), ConversationError> {
        let position = self
            .pending
            .iter()
            .position(|pending| pending == call_id)
            .ok_or_else(|| ConversationError::UnexpectedToolResult(call_id.to_string()))?;
        self.pending.remove(position);
        Ok(())
    }

    fn ensure_answered(&self) -> Result<(), ConversationError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(ConversationError::UnansweredToolCalls(self.pending.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FunctionCall;
    use serde_json::json;

    fn tool_call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            tool_type: "function".to_string(),
            function: FunctionCall {
                name: "add".to_string(),
                arguments: "{}".to_string(),
            },
        }
    }

    #[test]
    fn starts_with_system_message() {
        let conversation = Conversation::new("be polite");

        assert_eq!(conversation.len(), 1);
        assert!(!conversation.id().is_empty());
        assert_eq!(conversation.messages()[0].role, Role::System);
        assert_eq!(conversation.messages()[0].content, "be polite");
    }

    #[test]
    fn tool_results_answer_pending_calls() {
        let mut conversation = Conversation::new("sys");
        conversation.append_user("add 2 and 3").unwrap();
        conversation
            .append_assistant("", vec![tool_call("call_a"), tool_call("call_b")])
            .unwrap();

        assert_eq!(conversation.pending_calls(), &["call_a", "call_b"]);

        conversation.append_tool_result("call_b", &json!(5)).unwrap();
        conversation.append_tool_result("call_a", &json!(6)).unwrap();

        assert!(conversation.pending_calls().is_empty());
        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Tool]
        );
        assert_eq!(conversation.messages()[3].tool_call_id.as_deref(), Some("call_b"));
    }

    #[test]
    fn tool_result_without_pending_call_is_rejected() {
        let mut conversation = Conversation::new("sys");
        conversation.append_user("hi").unwrap();

        let error = conversation
            .append_tool_result("call_x", &json!(1))
            .unwrap_err();

        assert_eq!(
            error,
            ConversationError::UnexpectedToolResult("call_x".to_string())
        );
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn duplicate_tool_result_is_rejected() {
        let mut conversation = Conversation::new("sys");
        conversation
            .append_assistant("", vec![tool_call("call_a")])
            .unwrap();
        conversation.append_tool_result("call_a", &json!(1)).unwrap();

        assert!(conversation.append_tool_result("call_a", &json!(1)).is_err());
    }

    #[test]
    fn new_turn_requires_all_calls_answered() {
        let mut conversation = Conversation::new("sys");
        conversation
            .append_assistant("", vec![tool_call("call_a")])
            .unwrap();

        let error = conversation.append_user("next").unwrap_err();
        assert_eq!(
            error,
            ConversationError::UnansweredToolCalls(vec!["call_a".to_string()])
        );
        assert!(conversation.append_assistant("text", Vec::new()).is_err());
    }

    #[test]
    fn reset_keeps_only_system_message() {
        let mut conversation = Conversation::new("sys");
        conversation.append_user("a").unwrap();
        conversation
            .append_assistant("", vec![tool_call("call_a")])
            .unwrap();

        conversation.reset();

        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].content, "sys");
        assert!(conversation.pending_calls().is_empty());
    }

    #[test]
    fn restore_replaces_history_after_system_message() {
        let mut conversation = Conversation::new("sys");
        conversation.append_user("old").unwrap();

        conversation
            .restore(vec![Message::user("hello"), Message::assistant("hi there", Vec::new())])
            .unwrap();

        let contents: Vec<&str> = conversation
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["sys", "hello", "hi there"]);
    }

    #[test]
    fn restore_rejects_system_messages() {
        let mut conversation = Conversation::new("sys");

        let error = conversation
            .restore(vec![Message::system("override")])
            .unwrap_err();

        assert_eq!(error, ConversationError::MisplacedSystemMessage);
    }
}
