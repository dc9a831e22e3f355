//! Query embedders for semantic corpus search.
//!
//! The embedder must match the one the ingestion job used, otherwise cosine
//! scores against the stored vectors are meaningless.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
