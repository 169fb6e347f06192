// Document chunking, embedding providers and the in-memory vector store

pub mod document_processor;
pub mod provider;
pub mod vector_search;

pub use document_processor::*;
pub use provider::*;
pub use vector_search::*;
