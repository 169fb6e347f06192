use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::warn;

use crate::models::{AppState, HealthResponse};

pub const SERVICE_NAME: &str = "EV Assistant API";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .with_state(state)
}

/// Healthy only when the active provider has a key and answers a test prompt
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let api_key_configured = !state.config.llm.active_api_key().trim().is_empty();
    let mut response = HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        provider: state.config.llm.provider.clone(),
        model: state.llm.default_model().to_string(),
        api_key_configured,
        error: None,
    };

    let failure = if !api_key_configured {
        Some(format!("{} not configured", state.config.llm.api_key_env_var()))
    } else {
        match state.llm.test_connection().await {
            Ok(true) => None,
            Ok(false) => Some(format!("{} API returned an empty test response", state.llm.name())),
            Err(e) => Some(format!("{} API connection failed: {}", state.llm.name(), e)),
        }
    };

    match failure {
        None => (StatusCode::OK, Json(response)),
        Some(error) => {
            warn!(error = %error, "Health check failed");
            response.status = "unhealthy".to_string();
            response.error = Some(error);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response))
        }
    }
}
