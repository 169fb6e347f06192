//! API Routes
//!
//! This module organizes all HTTP endpoints for the application:
//! - `/api/chat`, `/api/test` - EV assistant chat and provider connection test
//! - `/api/query` - Question answering over indexed documents
//! - `/api/documents`, `/api/stats` - Document ingestion and store inspection
//! - `/api/health` - Health checks
//! - `/api/info`, `/status` - Service descriptors

pub mod chat;
pub mod documents;
pub mod health;
pub mod info;
pub mod query;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit},
    http::{StatusCode, Uri},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors_layer;
use crate::models::AppState;
use crate::types::{AppError, AppResult};

/// Request bodies up to 50 MB so whole manuals can be ingested in one call
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

pub const AVAILABLE_ROUTES: &[&str] = &[
    "GET /status",
    "GET /api/health",
    "GET /api/info",
    "POST /api/chat",
    "POST /api/test",
    "POST /api/query",
    "GET /api/documents",
    "POST /api/documents",
    "GET /api/documents/{id}",
    "GET /api/documents/{id}/chunks",
    "DELETE /api/documents/{id}",
    "GET /api/stats",
];

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(chat::router(state.clone()))
        .merge(query::router(state.clone()))
        .merge(documents::router(state.clone()))
        .merge(health::router(state))
        .merge(info::router())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Unwrap a JSON body. Oversized bodies map to 413, every other rejection to 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(rejection.body_text())
        } else {
            AppError::InvalidRequest(rejection.body_text())
        }
    })
}

async fn not_found(uri: Uri) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found",
            "message": format!("Route {} not found", uri),
            "availableRoutes": AVAILABLE_ROUTES,
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::UnconfiguredAdapter;
    use crate::test_support::{test_state, ScriptedLLM};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use tower::ServiceExt;

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    const WARRANTY: &str = "Battery Warranty\n\
        The battery warranty covers eight years or one lakh sixty thousand kilometres. \
        Keep the service records to make a warranty claim.";

    #[tokio::test]
    async fn test_document_lifecycle() {
        let app = create_router(test_state());

        let (status, created) = send(
            &app,
            Method::POST,
            "/api/documents",
            Some(json!({ "content": WARRANTY, "filename": "warranty.txt" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["documentId"].as_str().unwrap().to_string();
        assert_eq!(created["chunkCount"], 1);
        assert_eq!(created["metadata"]["title"], "Battery Warranty");

        let (status, documents) = send(&app, Method::GET, "/api/documents", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(documents.as_array().unwrap().len(), 1);
        assert_eq!(documents[0]["chunkCount"], 1);

        let (status, document) = send(&app, Method::GET, &format!("/api/documents/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(document["metadata"]["filename"], "warranty.txt");

        let (_, chunks) = send(&app, Method::GET, &format!("/api/documents/{}/chunks", id), None).await;
        assert_eq!(chunks[0]["documentId"], id.as_str());
        assert_eq!(chunks[0]["metadata"]["chunkIndex"], 0);

        let (_, stats) = send(&app, Method::GET, "/api/stats", None).await;
        assert_eq!(stats, json!({ "documentsCount": 1, "chunksCount": 1, "totalSize": 2 }));

        let (status, deleted) = send(&app, Method::DELETE, &format!("/api/documents/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["deleted"], true);

        let (status, _) = send(&app, Method::GET, &format!("/api/documents/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, chunks) = send(&app, Method::GET, &format!("/api/documents/{}/chunks", id), None).await;
        assert_eq!(chunks, json!([]));

        let (status, deleted) = send(&app, Method::DELETE, &format!("/api/documents/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["deleted"], false);
    }

    #[tokio::test]
    async fn test_ingest_accepts_large_manual() {
        let app = create_router(test_state());
        let sentence = "Regenerative braking recovers energy while the vehicle slows down. ";
        let content = format!("Service Manual\n{}", sentence.repeat(3 * 1024 * 1024 / sentence.len()));
        assert!(content.len() > 2 * 1024 * 1024);

        let (status, created) = send(&app, Method::POST, "/api/documents", Some(json!({ "content": content }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(created["chunkCount"].as_u64().unwrap() > 1);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected_with_413() {
        let app = create_router(test_state());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/documents")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(vec![b' '; MAX_BODY_BYTES + 1]))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Payload too large");
    }

    #[tokio::test]
    async fn test_query_returns_sources() {
        let app = create_router(test_state());
        send(&app, Method::POST, "/api/documents", Some(json!({ "content": WARRANTY }))).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/query",
            Some(json!({ "question": "How long is the battery warranty?" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Answer: ok");
        assert_eq!(body["model"], "scripted-model");
        assert_eq!(body["sources"][0]["title"], "Battery Warranty");
        assert!(body["sources"][0]["similarity"].as_f64().unwrap() >= 0.1);
    }

    #[tokio::test]
    async fn test_query_validation() {
        let app = create_router(test_state());

        let (status, body) = send(&app, Method::POST, "/api/query", Some(json!({ "question": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request");

        let (status, _) = send(&app, Method::POST, "/api/query", Some(json!({ "topK": 3 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_endpoint() {
        let llm = ScriptedLLM::new("Answer: Charge to 80% for daily use.");
        let app = create_router(test_state().with_llm(llm.clone()));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/chat",
            Some(json!({ "message": "How should I charge my Nexon EV?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["question"], "How should I charge my Nexon EV?");
        assert_eq!(body["answer"], "Answer: Charge to 80% for daily use.");
        assert!(body["timestamp"].is_string());
        assert_eq!(llm.calls(), 1);

        let (status, body) = send(&app, Method::POST, "/api/chat", Some(json!({ "message": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid request: Please provide a valid question about EVs");

        let (status, _) = send(&app, Method::POST, "/api/chat", Some(json!({ "text": "hi" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_reports_missing_key() {
        let app = create_router(test_state());
        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["provider"], "groq");
        assert_eq!(body["apiKeyConfigured"], true);

        let mut state = test_state().with_llm(UnconfiguredAdapter::new("Groq", "GROQ_API_KEY"));
        state.config.llm.groq_api_key.clear();
        let app = create_router(state);
        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["apiKeyConfigured"], false);
        assert_eq!(body["error"], "GROQ_API_KEY not configured");
    }

    #[tokio::test]
    async fn test_connection_test_endpoint() {
        let app = create_router(test_state());
        let (status, body) = send(&app, Method::POST, "/api/test", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");

        let app = create_router(test_state().with_llm(UnconfiguredAdapter::new("Groq", "GROQ_API_KEY")));
        let (status, body) = send(&app, Method::POST, "/api/test", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "failed");
    }

    #[tokio::test]
    async fn test_info_and_fallback() {
        let app = create_router(test_state());

        let (status, body) = send(&app, Method::GET, "/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");

        let (status, body) = send(&app, Method::GET, "/api/info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["capabilities"].as_array().unwrap().len() > 3);

        let (status, body) = send(&app, Method::GET, "/api/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Route /api/unknown not found");
        assert!(body["availableRoutes"]
            .as_array()
            .unwrap()
            .contains(&json!("POST /api/query")));
    }
}
