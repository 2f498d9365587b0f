use std::io::Write;

/// Crates whose output `--debug` turns up.
const WORKSPACE_CRATES: &[&str] = &[
    "agent_core",
    "agent_llm",
    "agent_loop",
    "agent_mcp",
    "agent_tools",
    "agent_server",
];

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(debug: bool) -> String {
    if !debug {
        return "info".to_string();
    }
    let mut filter = String::from("info");
    for name in WORKSPACE_CRATES {
        filter.push(',');
        filter.push_str(name);
        filter.push_str("=debug");
    }
    filter
}

/// Initialise `env_logger`. `RUST_LOG` wins over the `debug` flag.
pub fn init_logging(debug: bool) {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter(debug)),
    )
    .format(|buf, record| {
        writeln!(
            buf,
            "[{}] {} [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    })
    .init();
}
