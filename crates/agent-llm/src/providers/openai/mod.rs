use async_trait::async_trait;
use reqwest::Client;

use crate::provider::{LLMError, LLMProvider, LLMStream, Result};
use agent_core::{tools::ToolSchema, Message};

use super::common::openai_compat::{build_openai_compat_body, parse_openai_compat_sse_data};
use super::common::sse::llm_stream_from_sse;

pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat_stream(&self, messages: &[Message], tools: &[ToolSchema]) -> Result<LLMStream> {
        let body = build_openai_compat_body(&self.model, messages, tools);

        log::debug!(
            "OpenAI request: model={}, messages={}, tools={}",
            self.model,
            messages.len(),
            tools.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(LLMError::Api(format!("HTTP {}: {}", status, text)));
        }

        let stream = llm_stream_from_sse(response, |_event, data| {
            if data.trim().is_empty() {
                return Ok(Vec::new());
            }

            parse_openai_compat_sse_data(data)
        });

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LLMChunk;
    use agent_core::tools::ToolCallDelta;
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_values() {
        let provider = OpenAIProvider::new("test_key");
        assert_eq!(provider.api_key, "test_key");
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
        assert_eq!(provider.model, "gpt-4o-mini");
    }

    #[test]
    fn test_chained_builders() {
        let provider = OpenAIProvider::new("test_key")
            .with_base_url("https://custom.openai.com/v1/")
            .with_model("gpt-4o");

        assert_eq!(provider.base_url, "https://custom.openai.com/v1");
        assert_eq!(provider.model(), "gpt-4o");
    }

    async fn collect(mut stream: LLMStream) -> Vec<Result<LLMChunk>> {
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn test_streams_tokens_and_tool_call_deltas() {
        let mock_server = MockServer::start().await;

        let sse_body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"Sure\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"type\":\"function\",\"function\":{\"name\":\"add\",\"arguments\":\"\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"a\\\":2,\\\"b\\\":3}\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
            "data: [DONE]\n\n",
        );

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini", "stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider =
            OpenAIProvider::new("sk-test").with_base_url(format!("{}/v1", mock_server.uri()));

        let stream = provider
            .chat_stream(&[Message::user("add 2 and 3")], &[])
            .await
            .expect("stream");
        let chunks: Vec<LLMChunk> = collect(stream)
            .await
            .into_iter()
            .map(|item| item.expect("chunk"))
            .collect();

        assert_eq!(
            chunks,
            vec![
                LLMChunk::Token("Sure".to_string()),
                LLMChunk::ToolCallDeltas(vec![ToolCallDelta::new(0)
                    .with_id("call_1")
                    .with_name("add")
                    .with_arguments("")]),
                LLMChunk::ToolCallDeltas(vec![
                    ToolCallDelta::new(0).with_arguments("{\"a\":2,\"b\":3}")
                ]),
                LLMChunk::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_body_without_done_marker_ends_without_done() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(
                        "data: {\"choices\":[{\"delta\":{\"content\":\"The total is \"}}]}\n\n",
                    ),
            )
            .mount(&mock_server)
            .await;

        let provider = OpenAIProvider::new("sk").with_base_url(mock_server.uri());
        let stream = provider
            .chat_stream(&[Message::user("what did I spend?")], &[])
            .await
            .expect("stream");

        let chunks: Vec<LLMChunk> = collect(stream)
            .await
            .into_iter()
            .map(|item| item.expect("chunk"))
            .collect();

        assert_eq!(chunks, vec![LLMChunk::Token("The total is ".to_string())]);
    }

    #[tokio::test]
    async fn test_http_error_is_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&mock_server)
            .await;

        let provider = OpenAIProvider::new("bad").with_base_url(mock_server.uri());

        let result = provider.chat_stream(&[Message::user("hi")], &[]).await;

        match result {
            Err(LLMError::Api(message)) => {
                assert!(message.contains("401"));
                assert!(message.contains("invalid api key"));
            }
            Err(other) => panic!("expected LLMError::Api, got {other:?}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_is_stream_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(concat!(
                        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
                        "data: {not json}\n\n",
                    )),
            )
            .mount(&mock_server)
            .await;

        let provider = OpenAIProvider::new("sk").with_base_url(mock_server.uri());
        let stream = provider
            .chat_stream(&[Message::user("hi")], &[])
            .await
            .expect("stream");

        let items = collect(stream).await;

        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Ok(LLMChunk::Token(text)) if text == "Hi"));
        assert!(matches!(&items[1], Err(LLMError::Stream(_))));
    }
}
