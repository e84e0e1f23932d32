use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::Mutex;

use crate::ai::chat::{Chat, ChatBuilder, Session};
use crate::catalog::{self, CatalogLoad};
use crate::core::AppConfig;
use crate::openai::CompletionClient;
use crate::retriever::DenserRetriever;

/// A session is locked for the whole of a turn so each transcript
/// has a single writer.
pub type SharedSession = Arc<Mutex<Session>>;

pub struct AppState {
    pub config: AppConfig,
    // Loaded once at startup, same as a chat session start
    pub catalog: CatalogLoad,
    pub chat: Arc<Chat>,
    pub sessions: HashMap<String, SharedSession>,
}

impl AppState {
    pub fn new(config: AppConfig, catalog: CatalogLoad, chat: Chat) -> Self {
        Self {
            config,
            catalog,
            chat: Arc::new(chat),
            sessions: HashMap::new(),
        }
    }

    /// Builds the state from the configuration using the real
    /// provider clients.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let api_key = config
            .llm_api_key
            .clone()
            .ok_or_else(|| anyhow!("Missing env var GROQ_API_KEY"))?;
        let retriever = DenserRetriever::new(
            &config.retriever_url,
            &config.retriever_api_key,
            &config.retriever_id,
            config.request_timeout,
        );
        let completion = CompletionClient::new(&config.llm_api_hostname, &api_key);
        let chat = ChatBuilder::new(Arc::new(retriever), Arc::new(completion))
            .top_k(config.top_k)
            .subject(&config.subject)
            .build();
        let catalog = catalog::load(&config.models_path);

        Ok(Self::new(config, catalog, chat))
    }

    pub fn default_model(&self) -> Option<String> {
        self.catalog.select(self.config.default_model.as_deref())
    }

    pub fn session(&self, id: &str) -> Option<SharedSession> {
        self.sessions.get(id).cloned()
    }

    /// Drops the session. A turn still running on it finishes on
    /// its own copy and is then discarded.
    pub fn end_session(&mut self, id: &str) -> bool {
        let ended = self.sessions.remove(id).is_some();
        if ended {
            tracing::info!("Ended chat session {}", id);
        }
        ended
    }

    pub fn get_or_create_session(&mut self, id: &str) -> SharedSession {
        let default_model = self.default_model();
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!("Starting chat session {}", id);
                Arc::new(Mutex::new(Session::with_id(id, default_model)))
            })
            .clone()
    }
}
