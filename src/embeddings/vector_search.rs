//! In-memory vector store
//!
//! Holds documents and their chunk embeddings for the lifetime of the process
//! and answers cosine-similarity nearest-neighbour queries. Nothing is
//! persisted; the store is an index over data that lives elsewhere.
//!
//! All state sits behind one lock, so a document and its chunks become
//! visible (or disappear) in a single step.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::models::{ChunkMetadata, DocumentMetadata};

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VectorStoreError {
    #[error("Vectors must have the same length (expected {expected}, got {actual})")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub metadata: DocumentMetadata,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Document as handed to [`InMemoryVectorStore::store_document`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

/// Chunk as handed to the store, embedding already computed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChunk {
    pub content: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: ChunkMetadata,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub end_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub embedding: Arc<[f32]>,
    pub metadata: ChunkMetadata,
    pub start_index: usize,
    pub end_index: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub similarity: f64,
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub documents_count: usize,
    pub chunks_count: usize,
    pub total_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    pub id: String,
    pub score: f64,
}

/// Cosine similarity in `[-1, 1]`, computed in f64.
///
/// A zero vector on either side yields `0.0` (no similarity) instead of an
/// error; vectors of different lengths are rejected.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, VectorStoreError> {
    if a.len() != b.len() {
        return Err(VectorStoreError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Nearest-neighbour index the store delegates scoring to.
pub trait VectorIndex: Send + Sync {
    fn insert(&mut self, id: &str, vector: Arc<[f32]>);

    /// Returns `false` if `id` was not indexed.
    fn remove(&mut self, id: &str) -> bool;

    /// Up to `top_k` ids scoring at least `threshold`, best first; equal
    /// scores keep insertion order.
    fn search(&self, query: &[f32], top_k: usize, threshold: f64) -> Result<Vec<ScoredId>, VectorStoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);
}

/// Linear scan over every vector, in insertion order.
#[derive(Debug, Default)]
pub struct BruteForceIndex {
    entries: Vec<(String, Arc<[f32]>)>,
}

impl VectorIndex for BruteForceIndex {
    fn insert(&mut self, id: &str, vector: Arc<[f32]>) {
        self.entries.push((id.to_string(), vector));
    }

    fn remove(&mut self, id: &str) -> bool {
        match self.entries.iter().position(|(entry_id, _)| entry_id == id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    fn search(&self, query: &[f32], top_k: usize, threshold: f64) -> Result<Vec<ScoredId>, VectorStoreError> {
        let mut hits = Vec::new();
        for (id, vector) in &self.entries {
            let score = cosine_similarity(vector, query)?;
            if score >= threshold {
                hits.push(ScoredId { id: id.clone(), score });
            }
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

struct StoreState<I> {
    documents: HashMap<String, Document>,
    chunks: HashMap<String, Chunk>,
    document_chunks: HashMap<String, Vec<String>>,
    document_order: Vec<String>,
    index: I,
}

impl<I: VectorIndex> StoreState<I> {
    fn remove_document(&mut self, document_id: &str) -> bool {
        if let Some(chunk_ids) = self.document_chunks.remove(document_id) {
            for chunk_id in &chunk_ids {
                self.chunks.remove(chunk_id);
                self.index.remove(chunk_id);
            }
        }

        let removed = self.documents.remove(document_id).is_some();
        if removed {
            self.document_order.retain(|id| id != document_id);
        }
        removed
    }
}

pub struct InMemoryVectorStore<I = BruteForceIndex> {
    state: RwLock<StoreState<I>>,
}

impl InMemoryVectorStore<BruteForceIndex> {
    pub fn new() -> Self {
        Self::with_index(BruteForceIndex::default())
    }
}

impl Default for InMemoryVectorStore<BruteForceIndex> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: VectorIndex> InMemoryVectorStore<I> {
    pub fn with_index(index: I) -> Self {
        Self {
            state: RwLock::new(StoreState {
                documents: HashMap::new(),
                chunks: HashMap::new(),
                document_chunks: HashMap::new(),
                document_order: Vec::new(),
                index,
            }),
        }
    }

    /// Store a document with its chunks and return the document id.
    ///
    /// An id is generated when the document has none. Storing under an id
    /// that already exists replaces that document and all of its chunks.
    pub fn store_document(&self, document: NewDocument, chunks: Vec<NewChunk>) -> String {
        let document_id = document
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let created_at = Utc::now();
        let chunk_count = chunks.len();

        let mut guard = self.state.write();
        let state = &mut *guard;
        let replaced = state.remove_document(&document_id);

        let mut chunk_ids = Vec::with_capacity(chunk_count);
        for chunk in chunks {
            let chunk_id = Uuid::new_v4().to_string();
            let embedding: Arc<[f32]> = chunk.embedding.into();
            state.index.insert(&chunk_id, Arc::clone(&embedding));
            state.chunks.insert(
                chunk_id.clone(),
                Chunk {
                    id: chunk_id.clone(),
                    document_id: document_id.clone(),
                    content: chunk.content,
                    embedding,
                    metadata: chunk.metadata,
                    start_index: chunk.start_index,
                    end_index: chunk.end_index,
                    created_at,
                },
            );
            chunk_ids.push(chunk_id);
        }

        state.documents.insert(
            document_id.clone(),
            Document {
                id: document_id.clone(),
                metadata: document.metadata,
                chunk_count,
                created_at,
            },
        );
        state.document_chunks.insert(document_id.clone(), chunk_ids);
        state.document_order.push(document_id.clone());

        debug!(document_id = %document_id, chunk_count, replaced, "Stored document");
        document_id
    }

    /// Chunks most similar to `query_embedding`, best first, each annotated
    /// with its score and parent document.
    pub fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        threshold: f64,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let state = self.state.read();
        let hits = state.index.search(query_embedding, top_k, threshold)?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let chunk = state.chunks.get(&hit.id)?.clone();
                let document = state.documents.get(&chunk.document_id).cloned();
                Some(ScoredChunk {
                    chunk,
                    similarity: hit.score,
                    document,
                })
            })
            .collect())
    }

    pub fn get_document(&self, document_id: &str) -> Option<Document> {
        self.state.read().documents.get(document_id).cloned()
    }

    /// All documents in the order they were stored
    pub fn get_all_documents(&self) -> Vec<Document> {
        let state = self.state.read();
        state
            .document_order
            .iter()
            .filter_map(|id| state.documents.get(id).cloned())
            .collect()
    }

    /// Chunks of a document in their original order; empty for unknown ids
    pub fn get_document_chunks(&self, document_id: &str) -> Vec<Chunk> {
        let state = self.state.read();
        state
            .document_chunks
            .get(document_id)
            .map(|ids| ids.iter().filter_map(|id| state.chunks.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// Remove a document and every chunk it owns. Unknown ids are a no-op;
    /// the return value says whether anything was removed.
    pub fn delete_document(&self, document_id: &str) -> bool {
        let removed = self.state.write().remove_document(document_id);
        debug!(document_id = %document_id, removed, "Deleted document");
        removed
    }

    pub fn get_stats(&self) -> StoreStats {
        let state = self.state.read();
        let documents_count = state.documents.len();
        let chunks_count = state.chunks.len();
        StoreStats {
            documents_count,
            chunks_count,
            total_size: documents_count + chunks_count,
        }
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.documents.clear();
        state.chunks.clear();
        state.document_chunks.clear();
        state.document_order.clear();
        state.index.clear();
    }
}
