//! Retrieved evidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of the hex id derived from a chunk's normalized content.
const ID_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Local,
    Web,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Local => write!(f, "local"),
            SourceType::Web => write!(f, "web"),
        }
    }
}

/// One piece of retrieved text.
///
/// Fields are fixed at construction. The id is derived from the normalized
/// content, so two copies of the same passage share an id regardless of
/// where they were retrieved from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceChunk {
    id: String,
    content: String,
    source_type: SourceType,
    source_id: String,
    published_year: Option<i32>,
    relevance: f32,
    retrieved_at: DateTime<Utc>,
}

impl EvidenceChunk {
    /// `relevance` is clamped into `[0, 1]`; NaN becomes 0.
    pub fn new(
        content: impl Into<String>,
        source_type: SourceType,
        source_id: impl Into<String>,
        relevance: f32,
        retrieved_at: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        Self {
            id: content_id(&content),
            content,
            source_type,
            source_id: source_id.into(),
            published_year: None,
            relevance: clamp_relevance(relevance),
            retrieved_at,
        }
    }

    pub fn with_published_year(mut self, year: Option<i32>) -> Self {
        self.published_year = year;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn published_year(&self) -> Option<i32> {
        self.published_year
    }

    pub fn relevance(&self) -> f32 {
        self.relevance
    }

    pub fn retrieved_at(&self) -> DateTime<Utc> {
        self.retrieved_at
    }
}

fn clamp_relevance(relevance: f32) -> f32 {
    if relevance.is_nan() {
        0.0
    } else {
        relevance.clamp(0.0, 1.0)
    }
}

/// Lowercase with whitespace runs collapsed to one space.
pub fn normalize_content(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Short SHA-256 hex id of the normalized content.
pub fn content_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_content(text).as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(ID_LEN);
    hex
}
