use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::agents::ReplyAgent;
use crate::models::{AppState, ChatRequest, ChatResponse};
use crate::routes::json_body;
use crate::types::{AppResult, LLMMessage, LLMRequest};

const CONNECTION_TEST_PROMPT: &str =
    "Hello, just testing the connection. Please respond with \"Connection successful!\"";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(post_chat))
        .route("/api/test", post(test_connection))
        .with_state(state)
}

pub async fn post_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Json<ChatResponse>> {
    let request = json_body(payload)?;
    info!(message_len = request.message.len(), "Received chat request");

    let response = ReplyAgent::chat(&state, &request.message).await?;
    Ok(Json(response))
}

async fn test_connection(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let request = LLMRequest {
        model: state.llm.default_model().to_string(),
        messages: vec![LLMMessage::user(CONNECTION_TEST_PROMPT)],
        max_tokens: Some(50),
        temperature: None,
    };
    let timestamp = chrono::Utc::now().to_rfc3339();

    match state.llm.create_chat_completion(&request).await {
        Ok(response) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": format!("{} API connection is working", state.llm.name()),
                "response": response.content,
                "timestamp": timestamp,
            })),
        ),
        Err(e) => {
            error!(error = %e, "Connection test failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "failed",
                    "message": format!("{} API connection failed", state.llm.name()),
                    "error": e.to_string(),
                    "timestamp": timestamp,
                })),
            )
        }
    }
}
