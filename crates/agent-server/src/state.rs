use std::collections::HashMap;
use std::sync::Arc;

use agent_core::tools::ToolInvoker;
use agent_core::Conversation;
use agent_llm::LLMProvider;
use agent_loop::AgentLoopConfig;
use tokio::sync::{Mutex, RwLock};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI personal assistant. You help the USER with general tasks like getting weather data, checking their calendar, etc. You must be formal and polite when addressing the USER.";

pub type SharedConversation = Arc<Mutex<Conversation>>;

pub struct AppState {
    /// One conversation per session id. A turn holds the session's lock
    /// for its whole run, so requests on one session are serialised.
    pub sessions: RwLock<HashMap<String, SharedConversation>>,
    pub llm: Arc<dyn LLMProvider>,
    pub invoker: Arc<ToolInvoker>,
    pub system_prompt: String,
    pub loop_config: AgentLoopConfig,
}

impl AppState {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        invoker: Arc<ToolInvoker>,
        system_prompt: impl Into<String>,
        loop_config: AgentLoopConfig,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            llm,
            invoker,
            system_prompt: system_prompt.into(),
            loop_config,
        }
    }

    /// The session's conversation, created on first use.
    pub async fn session(&self, session_id: &str) -> SharedConversation {
        if let Some(existing) = self.sessions.read().await.get(session_id) {
            return existing.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                log::debug!("[{}] New session", session_id);
                Arc::new(Mutex::new(
                    Conversation::new(self.system_prompt.clone()).with_id(session_id),
                ))
            })
            .clone()
    }

    /// A conversation for a request that named no session. It is not
    /// stored, so it goes away with the turn.
    pub fn one_off_session(&self, session_id: &str) -> SharedConversation {
        Arc::new(Mutex::new(
            Conversation::new(self.system_prompt.clone()).with_id(session_id),
        ))
    }

    /// Reset a known session to its system message. Returns false if unknown.
    pub async fn reset_session(&self, session_id: &str) -> bool {
        let conversation = self.sessions.read().await.get(session_id).cloned();
        match conversation {
            Some(conversation) => {
                conversation.lock().await.reset();
                true
            }
            None => false,
        }
    }

    pub fn tool_count(&self) -> usize {
        self.invoker.registry().len()
    }
}
