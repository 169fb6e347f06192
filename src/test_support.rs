// Shared fixtures for unit and router tests

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::Config;
use crate::embeddings::HashingEmbedder;
use crate::llm::LLMAdapter;
use crate::models::AppState;
use crate::types::{AppResult, LLMRequest, LLMResponse, TokenUsage};

/// LLM double that answers every request with a fixed reply and records
/// what it was sent.
#[derive(Clone)]
pub struct ScriptedLLM {
    reply: Arc<String>,
    requests: Arc<Mutex<Vec<LLMRequest>>>,
}

impl ScriptedLLM {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Arc::new(reply.to_string()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> Option<LLMRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl LLMAdapter for ScriptedLLM {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.requests.lock().push(request.clone());
        Ok(LLMResponse {
            content: self.reply.to_string(),
            finish_reason: "stop".to_string(),
            usage: TokenUsage::default(),
        })
    }

    fn name(&self) -> &str {
        "Scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.llm.groq_api_key = "test-key".to_string();
    config.retrieval.threshold = 0.1;
    config
}

pub fn test_state() -> AppState {
    AppState::new(
        test_config(),
        Arc::new(HashingEmbedder::default()),
        Arc::new(ScriptedLLM::new("Answer: ok")),
    )
}

impl AppState {
    pub fn with_llm(mut self, llm: impl LLMAdapter + 'static) -> Self {
        self.llm = Arc::new(llm);
        self
    }
}
