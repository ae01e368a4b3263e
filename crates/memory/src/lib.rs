//! Semantic memory: sticky multi-provider embeddings, sentence chunking with
//! mean pooling, whole-snapshot persistence, linear-scan cosine search.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod embeddings_gemini;
pub mod embeddings_ollama;
pub mod embeddings_openai;
pub mod manager;
pub mod search;
pub mod store;
pub mod store_sqlite;
pub mod types;
