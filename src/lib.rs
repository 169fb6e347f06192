// FlexiEV Chat - EV assistant service with in-memory document retrieval

pub mod config;
pub mod models;
pub mod types;
pub mod agents;
pub mod llm;
pub mod embeddings;  // Chunking, embedding providers and the vector store
pub mod routes;
pub mod middleware;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
