//! Replays fixed chunk sequences instead of calling a model.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use crate::provider::{LLMError, LLMProvider, LLMStream, Result};
use crate::types::LLMChunk;
use agent_core::tools::{ToolCallDelta, ToolSchema};
use agent_core::Message;

#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Chunk(LLMChunk),
    /// Fail the stream with `LLMError::Stream`.
    Fail(String),
    Delay(Duration),
    /// Never yield again, like a stalled connection.
    Stall,
    /// End the stream here without `LLMChunk::Done`, like a dropped
    /// connection. Later steps are not replayed.
    Close,
}

/// One script per `chat_stream` call, consumed front to back.
///
/// A script that neither fails, closes nor yields `Done` itself is finished
/// with `LLMChunk::Done`, so plain scripts read as complete responses.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Vec<ScriptedStep>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Vec<ScriptedStep>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Message histories received so far, one per call.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn remaining(&self) -> usize {
        match self.scripts.lock() {
            Ok(scripts) => scripts.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl ScriptedStep {
    pub fn token(text: impl Into<String>) -> Self {
        Self::Chunk(LLMChunk::Token(text.into()))
    }

    pub fn deltas(deltas: Vec<ToolCallDelta>) -> Self {
        Self::Chunk(LLMChunk::ToolCallDeltas(deltas))
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat_stream(&self, messages: &[Message], _tools: &[ToolSchema]) -> Result<LLMStream> {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(messages.to_vec()),
            Err(poisoned) => poisoned.into_inner().push(messages.to_vec()),
        }

        let mut script = match self.scripts.lock() {
            Ok(mut scripts) => scripts.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
        .ok_or_else(|| LLMError::Api("no scripted response left".to_string()))?;

        if let Some(close_at) = script
            .iter()
            .position(|step| matches!(step, ScriptedStep::Close))
        {
            script.truncate(close_at);
        } else if !script.iter().any(|step| {
            matches!(
                step,
                ScriptedStep::Fail(_) | ScriptedStep::Chunk(LLMChunk::Done)
            )
        }) {
            script.push(ScriptedStep::Chunk(LLMChunk::Done));
        }

        let stream = futures::stream::iter(script)
            .then(|step| async move {
                match step {
                    ScriptedStep::Chunk(chunk) => Some(Ok(chunk)),
                    ScriptedStep::Fail(message) => Some(Err(LLMError::Stream(message))),
                    ScriptedStep::Delay(duration) => {
                        tokio::time::sleep(duration).await;
                        None
                    }
                    ScriptedStep::Stall => futures::future::pending().await,
                    ScriptedStep::Close => None,
                }
            })
            .filter_map(|item| async move { item });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_scripts_in_order_and_records_requests() {
        let provider = ScriptedProvider::new(vec![
            vec![ScriptedStep::token("first")],
            vec![
                ScriptedStep::deltas(vec![ToolCallDelta::new(0)]),
                ScriptedStep::Delay(Duration::from_millis(1)),
                ScriptedStep::Fail("boom".to_string()),
            ],
        ]);

        let mut first = provider
            .chat_stream(&[Message::user("one")], &[])
            .await
            .unwrap();
        assert_eq!(
            first.next().await.unwrap().unwrap(),
            LLMChunk::Token("first".to_string())
        );
        assert_eq!(first.next().await.unwrap().unwrap(), LLMChunk::Done);
        assert!(first.next().await.is_none());

        let mut second = provider
            .chat_stream(&[Message::user("one"), Message::user("two")], &[])
            .await
            .unwrap();
        assert!(matches!(
            second.next().await,
            Some(Ok(LLMChunk::ToolCallDeltas(_)))
        ));
        assert!(matches!(second.next().await, Some(Err(LLMError::Stream(_)))));
        assert!(second.next().await.is_none());

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].len(), 2);
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn close_ends_the_stream_without_done() {
        let provider = ScriptedProvider::new(vec![vec![
            ScriptedStep::token("partial"),
            ScriptedStep::Close,
            ScriptedStep::token("never"),
        ]]);

        let mut stream = provider
            .chat_stream(&[Message::user("hi")], &[])
            .await
            .unwrap();

        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            LLMChunk::Token("partial".to_string())
        );
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn exhausted_scripts_fail_the_request() {
        let provider = ScriptedProvider::new(Vec::new());

        let result = provider.chat_stream(&[Message::user("hi")], &[]).await;

        assert!(matches!(result, Err(LLMError::Api(_))));
    }
}
