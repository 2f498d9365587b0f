use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use agent_core::tools::{ToolInvoker, ToolRegistry, ToolRegistryBuilder};
use agent_llm::OpenAIProvider;
use agent_loop::AgentLoopConfig;
use agent_mcp::{register_mcp_tools, McpConfig};
use agent_tools::{register_builtin_tools, BudgetStore};

use crate::handlers;
use crate::state::AppState;

/// Everything the server needs at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub llm_base_url: String,
    pub model: String,
    pub api_key: String,
    pub system_prompt: String,
    pub mcp_config: Option<PathBuf>,
    pub budget_file: PathBuf,
    pub max_rounds: Option<usize>,
    pub tool_timeout: Option<Duration>,
    pub parallel_tools: bool,
}

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/chat", web::post().to(handlers::chat::handler))
        .route("/reset", web::post().to(handlers::reset::handler))
        .route("/health", web::get().to(handlers::health::handler));
}

/// Built-in tools first, then whatever the MCP servers offer.
pub async fn build_registry(config: &ServerConfig) -> io::Result<Arc<ToolRegistry>> {
    let mut builder = ToolRegistryBuilder::new();

    let budget = BudgetStore::open(&config.budget_file)
        .await
        .map_err(|e| io::Error::other(format!("budget store: {}", e)))?;
    register_builtin_tools(&mut builder, Arc::new(budget))
        .map_err(|e| io::Error::other(format!("built-in tools: {}", e)))?;

    if let Some(path) = &config.mcp_config {
        let mcp_config = McpConfig::load(path)
            .await
            .map_err(|e| io::Error::other(e.to_string()))?;
        register_mcp_tools(&mut builder, &mcp_config).await;
    }

    let registry = builder.build();
    log::info!(
        "Tool registry ready: {}",
        registry.list_tool_names().join(", ")
    );
    Ok(Arc::new(registry))
}

pub async fn build_state(config: &ServerConfig) -> io::Result<AppState> {
    let registry = build_registry(config).await?;
    let invoker = ToolInvoker::new(registry).with_timeout(config.tool_timeout);

    log::info!(
        "Using OpenAI-compatible provider at {} with model {}",
        config.llm_base_url,
        config.model
    );
    let llm = OpenAIProvider::new(config.api_key.clone())
        .with_base_url(config.llm_base_url.clone())
        .with_model(config.model.clone());

    let loop_config = AgentLoopConfig {
        max_rounds: config.max_rounds,
        parallel_tools: config.parallel_tools,
    };

    Ok(AppState::new(
        Arc::new(llm),
        Arc::new(invoker),
        config.system_prompt.clone(),
        loop_config,
    ))
}

pub async fn run_server(config: ServerConfig) -> io::Result<()> {
    let state = web::Data::new(build_state(&config).await?);

    log::info!("Listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DEFAULT_SYSTEM_PROMPT;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            llm_base_url: "http://localhost:1/v1".to_string(),
            model: "test-model".to_string(),
            api_key: "sk-test".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            mcp_config: None,
            budget_file: dir.path().join("budget_data.json"),
            max_rounds: Some(4),
            tool_timeout: Some(Duration::from_secs(30)),
            parallel_tools: false,
        }
    }

    #[tokio::test]
    async fn registry_holds_builtin_tools_without_mcp() {
        let dir = TempDir::new().unwrap();

        let registry = build_registry(&config(&dir)).await.unwrap();

        assert_eq!(registry.len(), 17);
        assert!(dir.path().join("budget_data.json").exists());
    }

    #[tokio::test]
    async fn missing_mcp_config_file_fails_startup() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.mcp_config = Some(dir.path().join("missing.json"));

        assert!(build_registry(&config).await.is_err());
    }

    #[tokio::test]
    async fn state_carries_loop_settings() {
        let dir = TempDir::new().unwrap();

        let state = build_state(&config(&dir)).await.unwrap();

        assert_eq!(state.loop_config.max_rounds, Some(4));
        assert!(!state.loop_config.parallel_tools);
        assert_eq!(state.tool_count(), 17);
    }
}
