// Static service descriptors

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn router() -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/api/info", get(info))
}

fn endpoints() -> Value {
    json!({
        "chat": "POST /api/chat - Ask EV-related questions",
        "query": "POST /api/query - Answer a question from indexed documents",
        "documents": "POST /api/documents - Index a document",
        "stats": "GET /api/stats - Vector store statistics",
        "health": "GET /api/health - Service health check",
        "info": "GET /api/info - Service information"
    })
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "FlexiEV Chat Service",
        "status": "running",
        "version": VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "description": "AI-powered EV assistant for Indian market",
        "endpoints": endpoints(),
        "supportedBrands": ["Tata", "Mahindra", "MG", "Hyundai", "Kia", "BYD"]
    }))
}

async fn info() -> Json<Value> {
    Json(json!({
        "service": "EV Battery & Vehicle Assistant",
        "version": VERSION,
        "description": "AI-powered assistant for EV queries in India",
        "supportedBrands": [
            "Tata Motors",
            "Mahindra Electric",
            "MG Motor India",
            "Hyundai",
            "Kia",
            "BYD",
            "Other Indian EV brands"
        ],
        "capabilities": [
            "Battery health and diagnostics",
            "Charging infrastructure guidance",
            "Vehicle performance optimization",
            "Warranty and maintenance advice",
            "Troubleshooting support",
            "Answers grounded in indexed EV manuals"
        ],
        "endpoints": endpoints()
    }))
}
