//! MCP (Model Context Protocol) client for remote tools.
//!
//! Servers are reached over SSE. Each discovered tool becomes an
//! [`McpRemoteTool`] that can be added to the shared tool registry.

pub mod config;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod tool;
pub mod transports;

pub use config::{HeaderConfig, McpConfig, McpServerConfig};
pub use discovery::{discover_tools, register_mcp_tools, register_remote_tools, McpServerConnection};
pub use error::{McpError, Result};
pub use protocol::{McpProtocolClient, McpTransport};
pub use tool::McpRemoteTool;
pub use transports::SseTransport;
