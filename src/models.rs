use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::config::Config;
use crate::embeddings::{
    DocumentProcessor, EmbeddingProvider, ExtractedMetadata, InMemoryVectorStore, ProcessorOptions,
};
use crate::llm::LLMAdapter;
use crate::types::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<InMemoryVectorStore>,
    pub processor: Arc<DocumentProcessor>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LLMAdapter>,
}

impl AppState {
    /// Build state around an empty store with the given providers
    pub fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LLMAdapter>,
    ) -> Self {
        let processor = DocumentProcessor::new(ProcessorOptions {
            chunk_size: config.retrieval.chunk_size,
            chunk_overlap: config.retrieval.chunk_overlap,
        });

        Self {
            config,
            store: Arc::new(InMemoryVectorStore::new()),
            processor: Arc::new(processor),
            embedder,
            llm,
        }
    }
}

/// Document metadata: well-known fields typed, everything else kept in an
/// open string-keyed map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentMetadata {
    /// Flatten into a single JSON object (typed fields first).
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(title) = &self.title {
            map.insert("title".to_string(), Value::String(title.clone()));
        }
        if let Some(filename) = &self.filename {
            map.insert("filename".to_string(), Value::String(filename.clone()));
        }
        for (key, value) in &self.extra {
            map.entry(key.clone()).or_insert_with(|| value.clone());
        }
        map
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub chunk_index: usize,
    pub total_chunks: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// API Request/Response types

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Retrieved chunk provenance returned alongside generated answers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    pub document_id: String,
    pub chunk_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub similarity: f64,
    pub snippet: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub question: String,
    pub answer: String,
    pub timestamp: String,
    pub model: String,
    pub sources: Vec<SourceReference>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
    #[serde(default)]
    pub metadata: Option<DocumentMetadata>,
    #[serde(default)]
    pub filename: Option<String>,
    /// Optional caller-chosen document id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub document_id: String,
    pub chunk_count: usize,
    pub metadata: ExtractedMetadata,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[validate(length(min = 1, message = "question must not be empty"))]
    pub question: String,
    #[validate(range(min = 1, max = 50))]
    pub top_k: Option<usize>,
    pub threshold: Option<f64>,
}

impl QueryRequest {
    /// Field validation plus the cosine range check on `threshold`
    pub fn check(&self) -> AppResult<()> {
        self.validate()?;
        if self.question.trim().is_empty() {
            return Err(AppError::InvalidRequest("question must not be empty".to_string()));
        }
        match self.threshold {
            Some(threshold) if !(-1.0..=1.0).contains(&threshold) => Err(AppError::InvalidRequest(
                format!("threshold must be within [-1, 1], got {}", threshold),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    pub model: String,
    pub sources: Vec<SourceReference>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub document_id: String,
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
    pub provider: String,
    pub model: String,
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
