//! Evidence sources for the compliance assistant.
//!
//! - [`CorpusIndex`]: the locally indexed document corpus (SQLite, semantic
//!   and BM25 lexical search)
//! - [`WebSearchProvider`]: live web search (Serper)
//!
//! Building the corpus (parsing, chunking, embedding documents) belongs to a
//! separate ingestion job; this crate only reads the index it produces.

pub mod corpus;
pub mod embeddings;
pub mod index;
pub mod store;
pub mod types;
pub mod web;

// Re-export commonly used types
pub use corpus::{CorpusIndex, WebSearchProvider};
pub use embeddings::{create_provider, EmbeddingProvider};
pub use store::SqliteCorpus;
pub use types::{CorpusChunk, CorpusHit, CorpusSource, CorpusStats, WebResult};
pub use web::SerperClient;
