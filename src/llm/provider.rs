use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::types::{AppError, AppResult, LLMMessage, LLMRequest, LLMResponse};

const CONNECTION_TEST_PROMPT: &str = "Hello, this is a test message.";

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;

    /// Human-readable provider name used in logs and error messages
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;

    /// Send a tiny prompt and report whether the provider produced any text
    async fn test_connection(&self) -> AppResult<bool> {
        let request = LLMRequest {
            model: self.default_model().to_string(),
            messages: vec![LLMMessage::user(CONNECTION_TEST_PROMPT)],
            max_tokens: Some(10),
            temperature: None,
        };
        let response = self.create_chat_completion(&request).await?;
        Ok(!response.content.trim().is_empty())
    }
}

/// Configuration for an LLM provider
#[derive(Debug, Clone)]
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    pub model: Option<String>,
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider_name: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig) -> AppResult<Self> {
        if provider.api_key.trim().is_empty() {
            return Err(AppError::Config(format!(
                "No API key configured for provider '{}'",
                provider.name
            )));
        }

        let model = provider.model.as_deref();
        let adapter: Box<dyn LLMAdapter> = match provider.name.as_str() {
            "groq" => Box::new(crate::llm::groq::GroqAdapter::new(&provider.api_key).with_model(model)),
            "openai" => {
                Box::new(crate::llm::openai::OpenAIAdapter::new(&provider.api_key).with_model(model))
            }
            "google" | "gemini" => {
                Box::new(crate::llm::google::GoogleAdapter::new(&provider.api_key).with_model(model))
            }
            other => {
                return Err(AppError::Config(format!("Unsupported provider: {}", other)));
            }
        };

        Ok(Self {
            adapter,
            provider_name: provider.name,
        })
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }
}

#[async_trait]
impl LLMAdapter for LLM {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }

    fn name(&self) -> &str {
        self.adapter.name()
    }

    fn default_model(&self) -> &str {
        self.adapter.default_model()
    }
}

/// Stand-in used when the active provider has no API key: the service still
/// starts, and every completion fails with a configuration error.
pub struct UnconfiguredAdapter {
    provider_name: String,
    env_var: String,
}

impl UnconfiguredAdapter {
    pub fn new(provider_name: &str, env_var: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            env_var: env_var.to_string(),
        }
    }
}

#[async_trait]
impl LLMAdapter for UnconfiguredAdapter {
    async fn create_chat_completion(&self, _request: &LLMRequest) -> AppResult<LLMResponse> {
        Err(AppError::Config(format!(
            "{} API key is not configured. Please set {}.",
            self.provider_name, self.env_var
        )))
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn default_model(&self) -> &str {
        "unconfigured"
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pull `error.message` out of an OpenAI- or Gemini-style error body,
/// falling back to the raw text.
pub fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Map a non-success provider response onto the service error taxonomy
pub fn error_for_status(provider: &str, status: StatusCode, body: &str) -> AppError {
    let detail = extract_error_message(body);
    match status.as_u16() {
        429 => AppError::RateLimited(format!(
            "{} API rate limit exceeded. Please try again in a moment. ({})",
            provider, detail
        )),
        401 | 403 => AppError::Config(format!(
            "{} API key is invalid. Please check your environment configuration. ({})",
            provider, detail
        )),
        402 => AppError::QuotaExceeded(format!(
            "{} API quota exceeded. Please check your usage limits.",
            provider
        )),
        400 => AppError::InvalidRequest(format!("Invalid request to {} API: {}", provider, detail)),
        code if code >= 500 => AppError::Upstream(format!("{} API error ({}): {}", provider, status, detail)),
        _ => AppError::LLMApi(format!("{} API error ({}): {}", provider, status, detail)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#;
        assert!(matches!(
            error_for_status("Groq", StatusCode::TOO_MANY_REQUESTS, body),
            AppError::RateLimited(_)
        ));
        assert!(matches!(
            error_for_status("Groq", StatusCode::UNAUTHORIZED, body),
            AppError::Config(_)
        ));
        assert!(matches!(
            error_for_status("Groq", StatusCode::PAYMENT_REQUIRED, body),
            AppError::QuotaExceeded(_)
        ));
        assert!(matches!(
            error_for_status("Groq", StatusCode::BAD_REQUEST, body),
            AppError::InvalidRequest(_)
        ));
        assert!(matches!(
            error_for_status("Groq", StatusCode::SERVICE_UNAVAILABLE, body),
            AppError::Upstream(_)
        ));
        assert!(matches!(
            error_for_status("Groq", StatusCode::NOT_FOUND, body),
            AppError::LLMApi(_)
        ));
    }

    #[test]
    fn test_extract_error_message() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"model not found"}}"#),
            "model not found"
        );
        assert_eq!(extract_error_message("  gateway timeout \n"), "gateway timeout");
    }

    #[test]
    fn test_factory_rejects_unknown_provider_and_missing_key() {
        let unknown = LLM::new(LLMProviderConfig {
            name: "anthropic".to_string(),
            api_key: "key".to_string(),
            model: None,
        });
        assert!(matches!(unknown, Err(AppError::Config(_))));

        let missing = LLM::new(LLMProviderConfig {
            name: "groq".to_string(),
            api_key: "  ".to_string(),
            model: None,
        });
        assert!(matches!(missing, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_adapter_fails_with_config_error() {
        let adapter = UnconfiguredAdapter::new("groq", "GROQ_API_KEY");
        match adapter.test_connection().await {
            Err(AppError::Config(message)) => assert!(message.contains("GROQ_API_KEY")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_factory_builds_adapters() {
        let llm = LLM::new(LLMProviderConfig {
            name: "groq".to_string(),
            api_key: "gsk-test".to_string(),
            model: None,
        })
        .unwrap();
        assert_eq!(llm.provider_name(), "groq");
        assert_eq!(llm.name(), "Groq");
        assert_eq!(llm.default_model(), crate::llm::groq::DEFAULT_GROQ_MODEL);

        let llm = LLM::new(LLMProviderConfig {
            name: "gemini".to_string(),
            api_key: "g-test".to_string(),
            model: Some("gemini-1.5-pro".to_string()),
        })
        .unwrap();
        assert_eq!(llm.name(), "Gemini");
        assert_eq!(llm.default_model(), "gemini-1.5-pro");
    }
}
