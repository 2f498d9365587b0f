//! Agent events as newline-delimited JSON records.

use actix_web::web::Bytes;
use agent_core::AgentEvent;
use serde_json::{json, Value};

/// The client-facing record for `event`, if it has one.
pub fn event_record(event: &AgentEvent) -> Option<Value> {
    match event {
        AgentEvent::Token { content } => Some(json!({"type": "content", "token": content})),
        AgentEvent::ToolComplete { result, .. } => Some(json!({"tool_result": result.value()})),
        AgentEvent::Error { message } => Some(json!({"type": "error", "message": message})),
        AgentEvent::ToolStart { .. } | AgentEvent::Complete { .. } => None,
    }
}

pub fn encode_line(record: &Value) -> Bytes {
    let mut line = record.to_string();
    line.push('\n');
    Bytes::from(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::tools::{ToolFailureKind, ToolResult};
    use agent_core::CompletionReason;

    #[test]
    fn token_becomes_content_record() {
        let record = event_record(&AgentEvent::Token {
            content: "Hel".to_string(),
        });
        assert_eq!(record, Some(json!({"type": "content", "token": "Hel"})));
    }

    #[test]
    fn tool_results_carry_value_or_null() {
        let success = event_record(&AgentEvent::ToolComplete {
            tool_call_id: "call_1".to_string(),
            tool_name: "add".to_string(),
            result: ToolResult::success(json!(5)),
        });
        let failure = event_record(&AgentEvent::ToolComplete {
            tool_call_id: "call_2".to_string(),
            tool_name: "weather".to_string(),
            result: ToolResult::failure(ToolFailureKind::ResourceUnavailable, "closed"),
        });

        assert_eq!(success, Some(json!({"tool_result": 5})));
        assert_eq!(failure, Some(json!({"tool_result": null})));
    }

    #[test]
    fn bookkeeping_events_are_not_written() {
        assert!(event_record(&AgentEvent::Complete {
            rounds: 1,
            reason: CompletionReason::Answered,
        })
        .is_none());
        assert!(event_record(&AgentEvent::ToolStart {
            tool_call_id: "call_1".to_string(),
            tool_name: "add".to_string(),
            arguments: json!({}),
        })
        .is_none());
    }

    #[test]
    fn lines_end_with_newline() {
        let line = encode_line(&json!({"type": "error", "message": "boom"}));
        assert_eq!(line.last(), Some(&b'\n'));
        assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);
        let parsed: Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(parsed, json!({"type": "error", "message": "boom"}));
    }
}
