//! Interfaces the answering pipeline retrieves evidence through.
//!
//! Both are read-only and shared across concurrent requests, so
//! implementations must be `Send + Sync` and hold no per-request state.

use crate::types::{CorpusHit, WebResult};
use comply_core::AppResult;

/// A pre-built, searchable store of document chunks.
#[async_trait::async_trait]
pub trait CorpusIndex: Send + Sync {
    /// Top-`k` chunks by embedding similarity to `query`.
    async fn search_semantic(&self, query: &str, k: usize) -> AppResult<Vec<CorpusHit>>;

    /// Top-`k` chunks by term overlap (BM25) with `query`.
    async fn search_lexical(&self, query: &str, k: usize) -> AppResult<Vec<CorpusHit>>;
}

/// An external web search API.
#[async_trait::async_trait]
pub trait WebSearchProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Top-`k` results for `query`, best first.
    async fn search(&self, query: &str, k: usize) -> AppResult<Vec<WebResult>>;
}
