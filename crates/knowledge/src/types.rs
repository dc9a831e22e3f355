//! Corpus and web search type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A source document the ingestion job indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusSource {
    /// Unique source identifier
    pub id: String,

    /// Original file path, when ingested from disk
    pub path: Option<PathBuf>,

    /// Original URL, when ingested from the web
    pub url: Option<String>,

    /// Content type (e.g., "pdf", "text")
    pub content_type: String,

    /// When this source was indexed
    pub learned_at: DateTime<Utc>,

    /// Raw size in bytes
    pub size_bytes: u64,
}

impl CorpusSource {
    /// Human-facing label: URL, then file name, then id.
    pub fn label(&self) -> String {
        if let Some(ref url) = self.url {
            return url.clone();
        }
        if let Some(name) = self
            .path
            .as_ref()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
        {
            return name.to_string();
        }
        self.id.clone()
    }
}

/// A stored chunk with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusChunk {
    /// Unique chunk identifier
    pub id: String,

    /// Source this chunk was cut from
    pub source_id: String,

    /// Position within the source
    pub position: u32,

    /// Chunk text
    pub text: String,

    /// Embedding vector (absent only before embedding)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Free-form metadata; `publishedYear` is read back at query time
    pub metadata: serde_json::Value,
}

/// One ranked result from the corpus index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusHit {
    pub chunk_id: String,
    pub content: String,
    /// Source label (URL, file name or id)
    pub source_id: String,
    /// Ranking score; cosine similarity for semantic, BM25 (higher is better) for lexical
    pub score: f32,
    /// Publication year recorded at ingestion, if any
    pub published_year: Option<i32>,
}

/// One ranked web search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
    /// Publication date as the provider reported it
    pub published_date: Option<String>,
}

impl WebResult {
    /// Host of the result URL without a leading `www.`.
    pub fn domain(&self) -> String {
        reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| "Unknown source".to_string())
    }
}

/// Statistics for the corpus index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusStats {
    pub sources_count: u32,
    pub chunks_count: u32,
    pub db_size_bytes: u64,
    pub embedder: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_label_prefers_url() {
        let source = CorpusSource {
            id: "s1".to_string(),
            path: Some(PathBuf::from("/data/msme_act.pdf")),
            url: Some("https://msme.gov.in/act".to_string()),
            content_type: "pdf".to_string(),
            learned_at: Utc::now(),
            size_bytes: 10,
        };
        assert_eq!(source.label(), "https://msme.gov.in/act");

        let source = CorpusSource { url: None, ..source };
        assert_eq!(source.label(), "msme_act.pdf");
    }

    #[test]
    fn test_web_result_domain() {
        let result = WebResult {
            title: "t".to_string(),
            snippet: "s".to_string(),
            url: "https://www.rbi.org.in/notification".to_string(),
            published_date: None,
        };
        assert_eq!(result.domain(), "rbi.org.in");

        let result = WebResult {
            url: "not a url".to_string(),
            ..result
        };
        assert_eq!(result.domain(), "Unknown source");
    }
}
