use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::embeddings::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_EMBEDDING_MODEL, DEFAULT_SIMILARITY_THRESHOLD,
    DEFAULT_TOP_K,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub provider: String,
    pub model: Option<String>,
    pub groq_api_key: String,
    pub openai_api_key: String,
    pub gemini_api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub threshold: f64,
}

impl LLMConfig {
    /// Key for the configured provider; empty when unset
    pub fn active_api_key(&self) -> &str {
        match self.provider.as_str() {
            "openai" => &self.openai_api_key,
            "google" | "gemini" => &self.gemini_api_key,
            _ => &self.groq_api_key,
        }
    }

    pub fn api_key_env_var(&self) -> &'static str {
        match self.provider.as_str() {
            "openai" => "OPENAI_API_KEY",
            "google" | "gemini" => "GEMINI_API_KEY",
            _ => "GROQ_API_KEY",
        }
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        _ => Ok(default),
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            server: ServerConfig {
                port: parse_or("PORT", 4500)?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            llm: LLMConfig {
                provider: env::var("LLM_PROVIDER")
                    .unwrap_or_else(|_| "groq".to_string())
                    .to_lowercase(),
                model: non_empty("LLM_MODEL"),
                groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
                temperature: parse_or("LLM_TEMPERATURE", 0.7)?,
                max_tokens: parse_or("LLM_MAX_TOKENS", 1500)?,
            },
            embedding: EmbeddingConfig {
                api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                model: non_empty("OPENAI_EMBEDDING_MODEL")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
                api_base: non_empty("EMBEDDING_API_BASE"),
            },
            retrieval: RetrievalConfig {
                chunk_size: parse_or("CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
                chunk_overlap: parse_or("CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?,
                top_k: parse_or("SEARCH_TOP_K", DEFAULT_TOP_K)?,
                threshold: parse_or("SEARCH_THRESHOLD", DEFAULT_SIMILARITY_THRESHOLD)?,
            },
        };

        Ok(config)
    }

    /// Reject settings that cannot work together
    pub fn validate(&self) -> Result<()> {
        match self.llm.provider.as_str() {
            "groq" | "openai" | "google" | "gemini" => {}
            other => bail!("LLM_PROVIDER must be one of groq, openai, gemini (got {:?})", other),
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!("LLM_TEMPERATURE must be within [0, 2]");
        }
        if self.llm.max_tokens == 0 {
            bail!("LLM_MAX_TOKENS must be positive");
        }
        if self.retrieval.chunk_size == 0 {
            bail!("CHUNK_SIZE must be positive");
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            bail!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.retrieval.chunk_overlap,
                self.retrieval.chunk_size
            );
        }
        if self.retrieval.top_k == 0 {
            bail!("SEARCH_TOP_K must be positive");
        }
        if !(-1.0..=1.0).contains(&self.retrieval.threshold) {
            bail!("SEARCH_THRESHOLD must be within [-1, 1]");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 4500,
                host: "0.0.0.0".to_string(),
                cors_allowed_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
            llm: LLMConfig {
                provider: "groq".to_string(),
                model: None,
                groq_api_key: String::new(),
                openai_api_key: String::new(),
                gemini_api_key: String::new(),
                temperature: 0.7,
                max_tokens: 1500,
            },
            embedding: EmbeddingConfig {
                api_key: String::new(),
                model: DEFAULT_EMBEDDING_MODEL.to_string(),
                api_base: None,
            },
            retrieval: RetrievalConfig {
                chunk_size: DEFAULT_CHUNK_SIZE,
                chunk_overlap: DEFAULT_CHUNK_OVERLAP,
                top_k: DEFAULT_TOP_K,
                threshold: DEFAULT_SIMILARITY_THRESHOLD,
            },
        }
    }
}
