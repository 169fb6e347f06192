// Google Gemini adapter (generateContent REST API)
// The conversation is flattened into a single "Role: content" prompt.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::provider::{error_for_status, extract_error_message, LLMAdapter};
use crate::types::{AppError, AppResult, ChatRole, LLMMessage, LLMRequest, LLMResponse, TokenUsage};
use crate::utils::retry::{with_retry, RetryPolicy};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

pub struct GoogleAdapter {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl GoogleAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::new_with_api_base(api_key, GEMINI_API_BASE)
    }

    pub fn new_with_api_base(api_key: &str, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            default_model: DEFAULT_GEMINI_MODEL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_model(mut self, model: Option<&str>) -> Self {
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.default_model = model.to_string();
        }
        self
    }

    /// Flatten chat messages into one prompt: `System: ...\n\nUser: ...`
    fn flatten_prompt(messages: &[LLMMessage]) -> String {
        let mut prompt = String::new();
        for message in messages {
            let label = match message.role {
                ChatRole::System => "System",
                ChatRole::User => "User",
                ChatRole::Assistant => "Assistant",
            };
            prompt.push_str(label);
            prompt.push_str(": ");
            prompt.push_str(&message.content);
            prompt.push_str("\n\n");
        }
        prompt.trim().to_string()
    }

    fn map_error(status: reqwest::StatusCode, body: &str) -> AppError {
        if body.contains("API_KEY_INVALID") {
            return AppError::Config(
                "Invalid Gemini API key. Please check your GEMINI_API_KEY environment variable."
                    .to_string(),
            );
        }
        if body.contains("QUOTA_EXCEEDED") {
            return AppError::QuotaExceeded(
                "Gemini API quota exceeded. Please check your usage limits.".to_string(),
            );
        }
        if body.contains("SAFETY") {
            return AppError::InvalidRequest(format!(
                "Content was blocked by Gemini safety filters. Please rephrase your question. ({})",
                extract_error_message(body)
            ));
        }
        error_for_status("Gemini", status, body)
    }

    async fn send(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let model = if request.model.is_empty() {
            self.default_model.as_str()
        } else {
            request.model.as_str()
        };
        let url = format!("{}/models/{}:generateContent", self.api_base, model);

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Self::flatten_prompt(&request.messages),
                }],
            }],
            generation_config: match (request.max_tokens, request.temperature) {
                (None, None) => None,
                (max_output_tokens, temperature) => Some(GenerationConfig {
                    max_output_tokens,
                    temperature,
                }),
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::map_error(status, &error_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMApi(format!("Failed to parse Gemini response: {}", e)))?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AppError::InvalidRequest(format!(
                "Content was blocked by Gemini safety filters ({}). Please rephrase your question.",
                reason
            )));
        }

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLMApi("Gemini returned no candidates".to_string()))?;

        let finish_reason = candidate.finish_reason.unwrap_or_else(|| "STOP".to_string());
        if finish_reason == "SAFETY" {
            return Err(AppError::InvalidRequest(
                "Content was blocked by Gemini safety filters. Please rephrase your question."
                    .to_string(),
            ));
        }

        let content = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
            .unwrap_or_default();

        let usage = parsed
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        debug!(model, total_tokens = usage.total_tokens, "Gemini generation finished");

        Ok(LLMResponse {
            content,
            finish_reason,
            usage,
        })
    }
}

#[async_trait]
impl LLMAdapter for GoogleAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        with_retry(self.retry, || self.send(request)).await
    }

    fn name(&self) -> &str {
        "Gemini"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}
