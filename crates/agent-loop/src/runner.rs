use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agent_core::tools::{ResolvedToolCall, ToolCall, ToolInvoker, ToolResult};
use agent_core::{AgentError, AgentEvent, CompletionReason, Conversation};
use agent_llm::LLMProvider;

use crate::config::AgentLoopConfig;
use crate::stream::handler::consume_llm_stream;

pub type Result<T> = std::result::Result<T, AgentError>;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Visible text of the last model pass.
    pub content: String,
    pub rounds: usize,
    pub reason: CompletionReason,
}

enum TurnPhase {
    Streaming,
    Executing(Vec<ResolvedToolCall>),
    Done(CompletionReason),
}

/// Run one user turn to completion against `conversation`.
///
/// Every failure other than cancellation is also reported on `event_tx` as
/// `AgentEvent::Error` before it is returned.
pub async fn run_agent_loop(
    conversation: &mut Conversation,
    user_message: String,
    event_tx: mpsc::Sender<AgentEvent>,
    llm: Arc<dyn LLMProvider>,
    invoker: &ToolInvoker,
    cancel_token: CancellationToken,
    config: &AgentLoopConfig,
) -> Result<TurnOutcome> {
    let session_id = conversation.id().to_string();

    let result = drive_turn(
        conversation,
        user_message,
        &event_tx,
        llm.as_ref(),
        invoker,
        &cancel_token,
        config,
    )
    .await;

    match &result {
        Ok(outcome) => {
            log::info!(
                "[{}] Turn finished after {} round(s): {:?}",
                session_id,
                outcome.rounds,
                outcome.reason
            );
            let _ = event_tx
                .send(AgentEvent::Complete {
                    rounds: outcome.rounds,
                    reason: outcome.reason,
                })
                .await;
        }
        Err(AgentError::Cancelled) => {
            log::info!("[{}] Turn cancelled", session_id);
        }
        Err(error) => {
            log::error!("[{}] Turn failed: {}", session_id, error);
            let _ = event_tx
                .send(AgentEvent::Error {
                    message: error.to_string(),
                })
                .await;
        }
    }

    result
}

async fn drive_turn(
    conversation: &mut Conversation,
    user_message: String,
    event_tx: &mpsc::Sender<AgentEvent>,
    llm: &dyn LLMProvider,
    invoker: &ToolInvoker,
    cancel_token: &CancellationToken,
    config: &AgentLoopConfig,
) -> Result<TurnOutcome> {
    let session_id = conversation.id().to_string();
    log::debug!(
        "[{}] Starting turn with message: {}",
        session_id,
        user_message
    );

    conversation.append_user(user_message)?;
    let tool_schemas = invoker.registry().list_tools();

    let mut rounds = 0usize;
    let mut content = String::new();
    let mut phase = TurnPhase::Streaming;

    loop {
        phase = match phase {
            TurnPhase::Streaming => {
                if cancel_token.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }
                rounds += 1;
                log::debug!(
                    "[{}] Round {}: streaming over {} messages",
                    session_id,
                    rounds,
                    conversation.len()
                );

                let stream = tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => return Err(AgentError::Cancelled),
                    stream = llm.chat_stream(conversation.messages(), tool_schemas) => {
                        stream.map_err(|error| AgentError::LLM(error.to_string()))?
                    }
                };

                let output = consume_llm_stream(stream, event_tx, cancel_token, &session_id).await?;
                let tool_calls: Vec<ToolCall> = output
                    .tool_calls
                    .iter()
                    .map(ResolvedToolCall::to_tool_call)
                    .collect();

                conversation.append_assistant(output.content.clone(), tool_calls)?;
                content = output.content;

                if output.tool_calls.is_empty() {
                    TurnPhase::Done(CompletionReason::Answered)
                } else {
                    TurnPhase::Executing(output.tool_calls)
                }
            }
            TurnPhase::Executing(calls) => {
                log::debug!(
                    "[{}] Round {}: executing {} tool call(s)",
                    session_id,
                    rounds,
                    calls.len()
                );
                execute_tool_calls(
                    conversation,
                    &calls,
                    invoker,
                    event_tx,
                    cancel_token,
                    config.parallel_tools,
                )
                .await?;

                match config.max_rounds {
                    Some(max_rounds) if rounds >= max_rounds => {
                        log::warn!(
                            "[{}] Round limit {} reached with tool results unread",
                            session_id,
                            max_rounds
                        );
                        TurnPhase::Done(CompletionReason::RoundLimit)
                    }
                    _ => TurnPhase::Streaming,
                }
            }
            TurnPhase::Done(reason) => {
                return Ok(TurnOutcome {
                    content,
                    rounds,
                    reason,
                });
            }
        };
    }
}

/// Invoke every call and record one result per call.
///
/// `ToolComplete` events go out in completion order; the conversation gets
/// results in the order of `calls`. On cancellation the in-flight invocations
/// are dropped and every call still gets an entry, `null` where no result
/// arrived, before `Cancelled` is returned.
async fn execute_tool_calls(
    conversation: &mut Conversation,
    calls: &[ResolvedToolCall],
    invoker: &ToolInvoker,
    event_tx: &mpsc::Sender<AgentEvent>,
    cancel_token: &CancellationToken,
    parallel: bool,
) -> Result<()> {
    for call in calls {
        let _ = event_tx
            .send(AgentEvent::ToolStart {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
            })
            .await;
    }

    let mut results: Vec<Option<ToolResult>> = vec![None; calls.len()];
    let concurrency = if parallel { calls.len().max(1) } else { 1 };
    let invocations: Vec<BoxFuture<'_, (usize, ToolResult)>> = calls
        .iter()
        .enumerate()
        .map(|(index, call)| async move { (index, invoker.invoke(call).await) }.boxed())
        .collect();
    let mut completions = stream::iter(invocations).buffer_unordered(concurrency);

    let mut cancelled = false;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                cancelled = true;
                None
            }
            next = completions.next() => next,
        };

        let Some((index, result)) = next else {
            break;
        };

        let call = &calls[index];
        let _ = event_tx
            .send(AgentEvent::ToolComplete {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                result: result.clone(),
            })
            .await;
        results[index] = Some(result);
    }
    drop(completions);

    for (call, result) in calls.iter().zip(results) {
        let value = result.map(|result| result.value()).unwrap_or(Value::Null);
        conversation.append_tool_result(&call.id, &value)?;
    }

    if cancelled {
        Err(AgentError::Cancelled)
    } else {
        Ok(())
    }
}
