pub mod handlers;
pub mod logging;
pub mod ndjson;
pub mod server;
pub mod state;

pub use server::{app_config, build_state, run_server, ServerConfig};
pub use state::{AppState, DEFAULT_SYSTEM_PROMPT};
