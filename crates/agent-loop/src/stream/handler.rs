use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agent_core::tools::{ResolvedToolCall, ToolCallAccumulator};
use agent_core::{AgentError, AgentEvent};
use agent_llm::{LLMChunk, LLMStream};

pub struct StreamHandlingOutput {
    pub content: String,
    pub token_count: usize,
    /// Calls resolved during the stream, in first-observed slot order.
    pub tool_calls: Vec<ResolvedToolCall>,
}

/// Drain one model stream.
///
/// Text is forwarded as `AgentEvent::Token` the moment it arrives. Tool-call
/// fragments go through a per-stream accumulator; calls that resolve are
/// collected but never run here. Only `LLMChunk::Done` ends the stream
/// cleanly; running out of chunks before it is an upstream failure.
pub async fn consume_llm_stream(
    mut stream: LLMStream,
    event_tx: &mpsc::Sender<AgentEvent>,
    cancel_token: &CancellationToken,
    session_id: &str,
) -> Result<StreamHandlingOutput, AgentError> {
    let mut content = String::new();
    let mut token_count = 0usize;
    let mut accumulator = ToolCallAccumulator::new();
    let mut resolved = Vec::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log::debug!("[{}] Stream cancelled, discarding {} partial calls", session_id, accumulator.len());
                return Err(AgentError::Cancelled);
            }
            next = stream.next() => next,
        };

        let Some(chunk_result) = next else {
            log::error!("[{}] LLM stream closed before completion", session_id);
            return Err(AgentError::LLM(
                "model stream closed before completion".to_string(),
            ));
        };

        match chunk_result {
            Ok(LLMChunk::Token(token)) => {
                if token.is_empty() {
                    continue;
                }
                token_count += token.len();
                content.push_str(&token);

                let _ = event_tx.send(AgentEvent::Token { content: token }).await;
            }
            Ok(LLMChunk::ToolCallDeltas(deltas)) => {
                log::trace!("[{}] Received {} tool call deltas", session_id, deltas.len());
                for delta in deltas {
                    let slot = accumulator.observe(delta);
                    if let Some(call) = accumulator.try_resolve(slot) {
                        log::debug!(
                            "[{}] Resolved tool call '{}' ({}) in slot {}",
                            session_id,
                            call.name,
                            call.id,
                            slot
                        );
                        resolved.push(call);
                    }
                }
            }
            Ok(LLMChunk::Done) => {
                log::debug!("[{}] LLM stream completed", session_id);
                break;
            }
            Err(error) => {
                log::error!("[{}] LLM stream failed: {}", session_id, error);
                return Err(AgentError::LLM(error.to_string()));
            }
        }
    }

    resolved.sort_by_key(|call: &ResolvedToolCall| {
        accumulator
            .observation_index(call.slot)
            .unwrap_or(usize::MAX)
    });

    for (slot, partial) in accumulator.into_unresolved() {
        log::warn!(
            "[{}] Discarding unresolved tool call in slot {} (name: '{}', {} bytes of arguments)",
            session_id,
            slot,
            partial.name,
            partial.arguments.len()
        );
    }

    Ok(StreamHandlingOutput {
        content,
        token_count,
        tool_calls: resolved,
    })
}
