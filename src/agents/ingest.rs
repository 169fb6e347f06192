//! Ingest Agent
//!
//! Turns raw document text into stored, searchable chunks: clean and chunk
//! the text, embed every chunk, then hand the batch to the vector store.

use tracing::{info, warn};
use validator::Validate;

use crate::embeddings::{NewChunk, NewDocument};
use crate::models::{AppState, IngestRequest, IngestResponse};
use crate::types::{AppError, AppResult};

pub struct IngestAgent;

impl IngestAgent {
    pub async fn ingest(state: &AppState, request: IngestRequest) -> AppResult<IngestResponse> {
        request.validate()?;
        if request.content.trim().is_empty() {
            return Err(AppError::InvalidRequest("content must not be empty".to_string()));
        }

        let mut metadata = request.metadata.unwrap_or_default();
        if metadata.filename.is_none() {
            metadata.filename = request.filename;
        }

        let extracted = state
            .processor
            .extract_metadata(&request.content, metadata.filename.as_deref().unwrap_or(""));
        if metadata.title.is_none() {
            metadata.title = Some(extracted.title.clone());
        }

        let processed = state.processor.process_document(&request.content, &metadata);
        if processed.is_empty() {
            warn!(title = ?metadata.title, "Document produced no chunks");
            return Err(AppError::InvalidRequest(
                "Document contains no usable sentences to index".to_string(),
            ));
        }

        let texts: Vec<String> = processed.iter().map(|c| c.content.clone()).collect();
        let embeddings = state.embedder.embed_batch(&texts).await?;
        if embeddings.len() != processed.len() {
            return Err(AppError::Embedding(format!(
                "Expected {} embeddings, got {}",
                processed.len(),
                embeddings.len()
            )));
        }

        let chunks: Vec<NewChunk> = processed
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| NewChunk {
                content: chunk.content,
                embedding,
                metadata: chunk.metadata,
                start_index: chunk.start_index,
                end_index: chunk.end_index,
            })
            .collect();
        let chunk_count = chunks.len();

        let document_id = state.store.store_document(
            NewDocument {
                id: request.id,
                metadata,
            },
            chunks,
        );

        info!(
            document_id = %document_id,
            chunk_count,
            model = state.embedder.model(),
            keywords = ?extracted.keywords,
            "Document ingested"
        );

        Ok(IngestResponse {
            document_id,
            chunk_count,
            metadata: extracted,
        })
    }
}
