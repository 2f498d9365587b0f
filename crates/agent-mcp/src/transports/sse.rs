use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};
use tokio::sync::{mpsc, oneshot};

use crate::config::{HeaderConfig, McpServerConfig};
use crate::error::{McpError, Result};
use crate::protocol::client::McpTransport;

/// MCP over server-sent events.
///
/// Server to client messages arrive on a long-lived GET stream. The first
/// `endpoint` event names the URL that client requests are POSTed to.
pub struct SseTransport {
    client: Client,
    headers: HeaderMap,
    post_url: Url,
    reader: tokio::task::JoinHandle<()>,
}

impl SseTransport {
    /// Open the event stream and wait for the `endpoint` event.
    ///
    /// Returns the transport and the channel of inbound `message` payloads.
    /// That channel closes when the event stream ends.
    pub async fn connect(config: &McpServerConfig) -> Result<(Self, mpsc::Receiver<String>)> {
        log::info!("Connecting to MCP SSE endpoint: {}", config.url);

        let base = Url::parse(&config.url)
            .map_err(|e| McpError::InvalidConfig(format!("invalid url '{}': {}", config.url, e)))?;
        let headers = build_headers(&config.headers)?;
        let client = Client::new();

        let response = tokio::time::timeout(
            config.connect_timeout(),
            client
                .get(base.clone())
                .headers(headers.clone())
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .send(),
        )
        .await
        .map_err(|_| McpError::Timeout(format!("connecting to {}", config.url)))??;

        if !response.status().is_success() {
            return Err(McpError::Connection(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let (message_tx, message_rx) = mpsc::channel(100);
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let server_id = config.id.clone();

        let reader = tokio::spawn(async move {
            let mut endpoint_tx = Some(endpoint_tx);
            let mut stream = response.bytes_stream().eventsource();
            while let Some(event) = stream.next().await {
                match event {
                    Ok(event) if event.event == "endpoint" => {
                        log::debug!("[{}] Got endpoint: {}", server_id, event.data);
                        if let Some(tx) = endpoint_tx.take() {
                            let _ = tx.send(event.data);
                        }
                    }
                    Ok(event) if event.event == "message" || event.event.is_empty() => {
                        if message_tx.send(event.data).await.is_err() {
                            break;
                        }
                    }
                    Ok(event) => log::debug!("[{}] Ignoring SSE event '{}'", server_id, event.event),
                    Err(e) => {
                        log::warn!("[{}] SSE stream error: {}", server_id, e);
                        break;
                    }
                }
            }
            log::warn!("[{}] SSE stream ended", server_id);
        });

        let endpoint = match tokio::time::timeout(config.connect_timeout(), endpoint_rx).await {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) => {
                return Err(McpError::Connection(
                    "event stream closed before the endpoint event".to_string(),
                ))
            }
            Err(_) => {
                reader.abort();
                return Err(McpError::Timeout(format!(
                    "no endpoint event from {}",
                    config.url
                )));
            }
        };

        let post_url = match base.join(endpoint.trim()) {
            Ok(url) => url,
            Err(e) => {
                reader.abort();
                return Err(McpError::Protocol(format!(
                    "invalid endpoint '{}': {}",
                    endpoint, e
                )));
            }
        };

        log::info!("MCP SSE transport connected, posting to {}", post_url);
        Ok((
            Self {
                client,
                headers,
                post_url,
                reader,
            },
            message_rx,
        ))
    }

    pub fn post_url(&self) -> &Url {
        &self.post_url
    }
}

fn build_headers(configured: &[HeaderConfig]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for HeaderConfig { name, value } in configured {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| McpError::InvalidConfig(format!("Invalid header name: {}", e)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| McpError::InvalidConfig(format!("Invalid header value: {}", e)))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn send(&self, message: String) -> Result<()> {
        let response = self
            .client
            .post(self.post_url.clone())
            .headers(self.headers.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Transport(format!(
                "POST failed: {} - {}",
                status, body
            )));
        }

        log::trace!("Sent message via POST to {}", self.post_url);
        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
