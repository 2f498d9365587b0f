/// Configuration for the agent loop.
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    /// Cap on model passes per turn. `None` keeps going until the model
    /// stops calling tools. The first pass always runs, so `Some(0)` acts
    /// like `Some(1)`.
    pub max_rounds: Option<usize>,
    /// Invoke the calls of one assistant message concurrently.
    pub parallel_tools: bool,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: None,
            parallel_tools: true,
        }
    }
}
