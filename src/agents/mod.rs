//! Agent System
//!
//! The two pipelines behind the HTTP API:
//!
//! - **Ingest Agent**: cleans and chunks documents, embeds the chunks and stores them
//! - **Reply Agent**: retrieves relevant chunks and generates grounded answers
//!
//! ## Pipeline Overview
//!
//! ```text
//! Document                       Question
//!    │                              │
//!    ▼                              ▼
//! ┌─────────────┐            ┌─────────────┐
//! │   Ingest    │ → chunks → │ Vector store│ → top-k chunks
//! │   Agent     │  + vectors │   search    │
//! └─────────────┘            └─────────────┘
//!                                   │
//!                                   ▼
//!                            ┌─────────────┐
//!                            │   Reply     │ → answer + sources
//!                            │   Agent     │
//!                            └─────────────┘
//! ```

pub mod ingest;
pub mod reply;

pub use ingest::IngestAgent;
pub use reply::{ReplyAgent, ReplyMode};
