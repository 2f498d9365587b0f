//! Shared SSE -> [`LLMStream`] adapter.

use eventsource_stream::Eventsource;
use futures_util::{stream, StreamExt};
use reqwest::Response;

use crate::provider::{LLMError, LLMStream, Result};
use crate::types::LLMChunk;

fn to_stream_error(err: LLMError) -> LLMError {
    match err {
        LLMError::Stream(msg) => LLMError::Stream(msg),
        other => LLMError::Stream(other.to_string()),
    }
}

/// Convert an SSE HTTP [`Response`] into an [`LLMStream`].
///
/// `handler` receives the SSE event name and data payload for each event and
/// returns the chunks it carries, possibly none. An `Err` is emitted as
/// `LLMError::Stream`.
pub fn llm_stream_from_sse<H>(response: Response, mut handler: H) -> LLMStream
where
    H: FnMut(&str, &str) -> Result<Vec<LLMChunk>> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .eventsource()
        .map(move |event| {
            let chunks: Vec<Result<LLMChunk>> = match event {
                Ok(event) => match handler(event.event.as_str(), event.data.as_str()) {
                    Ok(chunks) => chunks.into_iter().map(Ok).collect(),
                    Err(err) => vec![Err(to_stream_error(err))],
                },
                Err(err) => vec![Err(LLMError::Stream(err.to_string()))],
            };
            stream::iter(chunks)
        })
        .flatten();

    Box::pin(stream)
}
