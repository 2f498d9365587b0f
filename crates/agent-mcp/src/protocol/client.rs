use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::error::{McpError, Result};
use crate::protocol::models::*;

/// Outbound half of an MCP connection.
///
/// Inbound messages arrive on the `mpsc::Receiver` handed to
/// [`McpProtocolClient::new`]; when that channel closes the connection is
/// considered lost.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn send(&self, message: String) -> Result<()>;
}

type PendingMap = HashMap<u64, oneshot::Sender<JsonRpcResponse>>;

/// MCP protocol client
pub struct McpProtocolClient {
    transport: Box<dyn McpTransport>,
    next_id: AtomicU64,
    pending: Arc<Mutex<PendingMap>>,
    connected: Arc<AtomicBool>,
    dispatcher: tokio::task::JoinHandle<()>,
}

impl McpProtocolClient {
    pub fn new(transport: Box<dyn McpTransport>, inbound: mpsc::Receiver<String>) -> Self {
        let pending = Arc::new(Mutex::new(PendingMap::new()));
        let connected = Arc::new(AtomicBool::new(true));
        let dispatcher = tokio::spawn(Self::dispatch(inbound, pending.clone(), connected.clone()));

        Self {
            transport,
            next_id: AtomicU64::new(1),
            pending,
            connected,
            dispatcher,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Route responses to their waiting requests until the inbound channel
    /// closes, then drop every pending sender.
    async fn dispatch(
        mut inbound: mpsc::Receiver<String>,
        pending: Arc<Mutex<PendingMap>>,
        connected: Arc<AtomicBool>,
    ) {
        while let Some(message) = inbound.recv().await {
            match serde_json::from_str::<JsonRpcResponse>(&message) {
                Ok(response) => {
                    let waiter = pending.lock().await.remove(&response.id);
                    match waiter {
                        Some(sender) => {
                            let _ = sender.send(response);
                        }
                        None => log::debug!("Dropping response for unknown request {}", response.id),
                    }
                }
                Err(_) => match serde_json::from_str::<JsonRpcNotification>(&message) {
                    Ok(notification) => {
                        log::debug!("Ignoring MCP notification '{}'", notification.method)
                    }
                    Err(e) => log::warn!("Unrecognised MCP message: {}", e),
                },
            }
        }

        connected.store(false, Ordering::SeqCst);
        let dropped = {
            let mut pending = pending.lock().await;
            let count = pending.len();
            pending.clear();
            count
        };
        log::warn!("MCP channel closed, {} pending request(s) dropped", dropped);
    }

    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        if !self.is_connected() {
            return Err(McpError::Disconnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request_json = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        // The dispatcher may have drained the map just before the insert.
        if !self.is_connected() {
            self.pending.lock().await.remove(&id);
            return Err(McpError::Disconnected);
        }

        if let Err(e) = self.transport.send(request_json).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(McpError::Disconnected),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(McpError::Timeout(format!(
                    "{} request {} timed out after {}ms",
                    method,
                    id,
                    timeout.as_millis()
                )));
            }
        };

        if let Some(error) = response.error {
            return Err(McpError::Protocol(format!("{}: {}", error.code, error.message)));
        }
        response
            .result
            .ok_or_else(|| McpError::Protocol("Missing result".to_string()))
    }

    pub async fn initialize(&self, timeout: Duration) -> Result<McpInitializeResult> {
        let params = serde_json::to_value(McpInitializeRequest::default())?;
        let result = self.send_request("initialize", Some(params), timeout).await?;
        let result: McpInitializeResult = serde_json::from_value(result)?;

        let initialized = JsonRpcNotification::new("notifications/initialized");
        self.transport
            .send(serde_json::to_string(&initialized)?)
            .await?;

        Ok(result)
    }

    pub async fn list_tools(&self, timeout: Duration) -> Result<Vec<McpToolInfo>> {
        let result = self.send_request("tools/list", None, timeout).await?;
        let result: McpToolListResult = serde_json::from_value(result)?;
        Ok(result.tools)
    }

    /// Run a remote tool. An `isError` result becomes `McpError::ToolExecution`.
    pub async fn call_tool(&self, name: &str, arguments: Value, timeout: Duration) -> Result<Value> {
        let params = serde_json::to_value(McpToolCallRequest {
            name: name.to_string(),
            arguments: Some(arguments),
        })?;

        let result = self.send_request("tools/call", Some(params), timeout).await?;
        let result: McpToolCallResult = serde_json::from_value(result)?;

        if result.is_error {
            return Err(McpError::ToolExecution(result.error_text()));
        }
        Ok(result.into_value())
    }
}

impl Drop for McpProtocolClient {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use serde_json::json;

    /// Answers requests in-process, the way a tiny MCP server would.
    pub struct ScriptedTransport {
        inbound: mpsc::Sender<String>,
        handler: Box<dyn Fn(&JsonRpcRequest) -> Option<Value> + Send + Sync>,
    }

    impl ScriptedTransport {
        pub fn new(
            handler: impl Fn(&JsonRpcRequest) -> Option<Value> + Send + Sync + 'static,
        ) -> (Self, mpsc::Receiver<String>) {
            let (tx, rx) = mpsc::channel(16);
            (
                Self {
                    inbound: tx,
                    handler: Box::new(handler),
                },
                rx,
            )
        }
    }

    #[async_trait]
    impl McpTransport for ScriptedTransport {
        async fn send(&self, message: String) -> Result<()> {
            let Ok(request) = serde_json::from_str::<JsonRpcRequest>(&message) else {
                return Ok(()); // notification
            };
            if let Some(reply) = (self.handler)(&request) {
                let mut envelope = json!({"jsonrpc": "2.0", "id": request.id});
                if reply.get("code").is_some() {
                    envelope["error"] = reply;
                } else {
                    envelope["result"] = reply;
                }
                let _ = self.inbound.send(envelope.to_string()).await;
            }
            Ok(())
        }
    }

    /// A small server offering `add` and `divide`.
    pub fn math_server(request: &JsonRpcRequest) -> Option<Value> {
        let params = request.params.clone().unwrap_or(Value::Null);
        match request.method.as_str() {
            "initialize" => Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {"listChanged": false}},
                "serverInfo": {"name": "Math", "version": "1.0"}
            })),
            "tools/list" => Some(json!({"tools": [
                {"name": "add", "description": "Add two numbers", "inputSchema": {"type": "object"}},
                {"name": "divide", "description": "Divide two numbers"}
            ]})),
            "tools/call" => {
                let args = &params["arguments"];
                match params["name"].as_str() {
                    Some("add") => {
                        let sum = args["a"].as_i64()? + args["b"].as_i64()?;
                        Some(json!({"content": [{"type": "text", "text": sum.to_string()}]}))
                    }
                    Some("divide") if args["b"] == json!(0) => Some(json!({
                        "isError": true,
                        "content": [{"type": "text", "text": "division by zero"}]
                    })),
                    _ => Some(json!({"code": -32602, "message": "Unknown tool"})),
                }
            }
            _ => None,
        }
    }
}
