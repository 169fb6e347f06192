use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::info;

use crate::agents::IngestAgent;
use crate::embeddings::{Chunk, Document, StoreStats};
use crate::models::{AppState, DeleteResponse, IngestRequest, IngestResponse};
use crate::routes::json_body;
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/documents", get(list_documents).post(create_document))
        .route("/api/documents/{id}", get(get_document).delete(delete_document))
        .route("/api/documents/{id}/chunks", get(get_document_chunks))
        .route("/api/stats", get(get_stats))
        .with_state(state)
}

async fn create_document(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<IngestResponse>)> {
    let request = json_body(payload)?;
    let response = IngestAgent::ingest(&state, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_documents(State(state): State<AppState>) -> Json<Vec<Document>> {
    Json(state.store.get_all_documents())
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Document>> {
    state
        .store
        .get_document(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)))
}

/// Unknown ids yield an empty list
async fn get_document_chunks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<Chunk>> {
    Json(state.store.get_document_chunks(&id))
}

async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<DeleteResponse> {
    let deleted = state.store.delete_document(&id);
    info!(document_id = %id, deleted, "Delete requested");
    Json(DeleteResponse {
        document_id: id,
        deleted,
    })
}

async fn get_stats(State(state): State<AppState>) -> Json<StoreStats> {
    Json(state.store.get_stats())
}
