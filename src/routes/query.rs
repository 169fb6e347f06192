use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};

use crate::agents::ReplyAgent;
use crate::models::{AppState, QueryRequest, QueryResponse};
use crate::routes::json_body;
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/query", post(query))
        .with_state(state)
}

async fn query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> AppResult<Json<QueryResponse>> {
    let request = json_body(payload)?;
    let response = ReplyAgent::answer_query(&state, request).await?;
    Ok(Json(response))
}
