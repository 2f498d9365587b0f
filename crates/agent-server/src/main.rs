use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use agent_server::logging::init_logging;
use agent_server::{run_server, ServerConfig, DEFAULT_SYSTEM_PROMPT};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "agent-server")]
#[command(about = "Streaming tool-calling chat server")]
#[command(version)]
struct Cli {
    /// Enable debug mode
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Server port
    #[arg(long, env = "PORT", default_value = "5000")]
    port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    llm_base_url: String,

    /// LLM model name
    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    /// LLM API key
    #[arg(long, env = "OPENAI_API_KEY")]
    api_key: String,

    /// System prompt for new sessions
    #[arg(long, env = "SYSTEM_PROMPT", default_value = DEFAULT_SYSTEM_PROMPT)]
    system_prompt: String,

    /// JSON file listing MCP servers
    #[arg(long, env = "MCP_CONFIG")]
    mcp_config: Option<PathBuf>,

    /// Where budget records are kept
    #[arg(long, env = "BUDGET_FILE", default_value = "budget_data.json")]
    budget_file: PathBuf,

    /// Cap on model passes per turn (at least 1)
    #[arg(long, env = "MAX_ROUNDS")]
    max_rounds: Option<NonZeroUsize>,

    /// Per-tool timeout in seconds
    #[arg(long, env = "TOOL_TIMEOUT_SECS")]
    tool_timeout_secs: Option<u64>,

    /// Run the tool calls of one message one after another
    #[arg(long)]
    sequential_tools: bool,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            llm_base_url: cli.llm_base_url,
            model: cli.model,
            api_key: cli.api_key,
            system_prompt: cli.system_prompt,
            mcp_config: cli.mcp_config,
            budget_file: cli.budget_file,
            max_rounds: cli.max_rounds.map(NonZeroUsize::get),
            tool_timeout: cli.tool_timeout_secs.map(Duration::from_secs),
            parallel_tools: !cli.sequential_tools,
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    log::info!("Starting agent server on {}:{}", cli.host, cli.port);
    if cli.debug {
        log::debug!("Debug mode enabled");
        log::debug!("  Budget file: {}", cli.budget_file.display());
        log::debug!("  MCP config: {:?}", cli.mcp_config);
        log::debug!("  Max rounds: {:?}", cli.max_rounds);
        log::debug!("  Tool timeout: {:?}s", cli.tool_timeout_secs);
    }

    run_server(cli.into()).await
}
