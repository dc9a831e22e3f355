//! Evidence retrieval from the local corpus and the web.
//!
//! A failing source never fails the request: it is reported as
//! [`SourceStatus::Unavailable`] with no chunks, and fusion proceeds with
//! whatever the other source returned.

use crate::control::with_timeout;
use crate::evidence::{EvidenceChunk, SourceType};
use crate::fusion::detect::year_from_date;
use chrono::{DateTime, Datelike, Utc};
use comply_core::{AppResult, PipelineSettings};
use comply_knowledge::{CorpusHit, CorpusIndex, WebSearchProvider};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of querying one evidence source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SourceStatus {
    Ok { count: usize },
    Unavailable { reason: String },
    /// Not queried for this intent.
    Skipped,
}

impl SourceStatus {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SourceStatus::Unavailable { .. })
    }
}

/// Chunks from one source plus how the source behaved.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub chunks: Vec<EvidenceChunk>,
    pub status: SourceStatus,
}

impl Retrieval {
    pub fn skipped() -> Self {
        Self {
            chunks: Vec::new(),
            status: SourceStatus::Skipped,
        }
    }

    fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            chunks: Vec::new(),
            status: SourceStatus::Unavailable {
                reason: reason.into(),
            },
        }
    }

    fn ok(chunks: Vec<EvidenceChunk>) -> Self {
        Self {
            status: SourceStatus::Ok {
                count: chunks.len(),
            },
            chunks,
        }
    }
}

pub struct EvidenceRetriever {
    corpus: Option<Arc<dyn CorpusIndex>>,
    web: Option<Arc<dyn WebSearchProvider>>,
    timeout: Duration,
    recency_qualifier: String,
}

impl EvidenceRetriever {
    pub fn new(
        corpus: Option<Arc<dyn CorpusIndex>>,
        web: Option<Arc<dyn WebSearchProvider>>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            corpus,
            web,
            timeout: Duration::from_secs(settings.retrieval_timeout_secs),
            recency_qualifier: settings.recency_qualifier.clone(),
        }
    }

    /// Union of the semantic and lexical rankings.
    ///
    /// Both searches run concurrently. A chunk found by both keeps the
    /// higher of its two scores. Lexical scores are unbounded, so they are
    /// scaled by the best lexical score first.
    pub async fn retrieve_local(&self, question: &str, k: usize) -> Retrieval {
        let Some(corpus) = self.corpus.as_ref() else {
            return Retrieval::unavailable("no corpus index configured");
        };

        let (semantic, lexical) = tokio::join!(
            with_timeout(
                self.timeout,
                "semantic search",
                corpus.search_semantic(question, k)
            ),
            with_timeout(
                self.timeout,
                "lexical search",
                corpus.search_lexical(question, k)
            ),
        );

        let (semantic, lexical) = match (semantic, lexical) {
            (Err(sem_err), Err(lex_err)) => {
                tracing::warn!(
                    semantic = %sem_err,
                    lexical = %lex_err,
                    "Corpus index unavailable"
                );
                return Retrieval::unavailable(sem_err.to_string());
            }
            (semantic, lexical) => (
                log_partial(semantic, "semantic"),
                log_partial(lexical, "lexical"),
            ),
        };

        let retrieved_at = Utc::now();
        let chunks = merge_rankings(semantic, lexical)
            .into_iter()
            .map(|(hit, relevance)| {
                EvidenceChunk::new(
                    hit.content,
                    SourceType::Local,
                    hit.source_id,
                    relevance,
                    retrieved_at,
                )
                .with_published_year(hit.published_year)
            })
            .collect::<Vec<_>>();

        tracing::debug!(count = chunks.len(), "Local evidence retrieved");
        Retrieval::ok(chunks)
    }

    /// Web results for the question with a recency qualifier appended.
    ///
    /// Relevance decays with rank: `1 / (1 + rank / 4)`.
    pub async fn retrieve_web(&self, question: &str, k: usize) -> Retrieval {
        let Some(web) = self.web.as_ref() else {
            return Retrieval::unavailable("no web search provider configured");
        };

        let retrieved_at = Utc::now();
        let query = self.web_query(question, retrieved_at);

        let results = match with_timeout(self.timeout, "web search", web.search(&query, k)).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(
                    provider = web.provider_name(),
                    error = %e,
                    "Web search unavailable"
                );
                return Retrieval::unavailable(e.to_string());
            }
        };

        let current_year = retrieved_at.year();
        let chunks = results
            .into_iter()
            .enumerate()
            .map(|(rank, result)| {
                let year = result
                    .published_date
                    .as_deref()
                    .and_then(|d| year_from_date(d, current_year));
                EvidenceChunk::new(
                    result.snippet,
                    SourceType::Web,
                    result.url,
                    1.0 / (1.0 + 0.25 * rank as f32),
                    retrieved_at,
                )
                .with_published_year(year)
            })
            .collect::<Vec<_>>();

        tracing::debug!(count = chunks.len(), "Web evidence retrieved");
        Retrieval::ok(chunks)
    }

    /// The question plus the recency qualifier, `{year}` filled in.
    pub fn web_query(&self, question: &str, now: DateTime<Utc>) -> String {
        let qualifier = self
            .recency_qualifier
            .replace("{year}", &now.year().to_string());
        format!("{} {}", question.trim(), qualifier.trim())
            .trim()
            .to_string()
    }
}

fn log_partial(result: AppResult<Vec<CorpusHit>>, ranking: &str) -> Vec<CorpusHit> {
    match result {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!(ranking, error = %e, "Corpus ranking failed, using the other");
            Vec::new()
        }
    }
}

/// Union keyed by chunk id, in first-seen order (semantic first).
fn merge_rankings(semantic: Vec<CorpusHit>, lexical: Vec<CorpusHit>) -> Vec<(CorpusHit, f32)> {
    let lexical_max = lexical
        .iter()
        .map(|h| h.score)
        .fold(0.0_f32, f32::max);

    let mut order: Vec<String> = Vec::new();
    let mut merged: BTreeMap<String, (CorpusHit, f32)> = BTreeMap::new();

    let scored = semantic
        .into_iter()
        .map(|h| {
            let score = h.score;
            (h, score)
        })
        .chain(lexical.into_iter().map(|h| {
            let score = if lexical_max > 0.0 {
                h.score / lexical_max
            } else {
                0.0
            };
            (h, score)
        }));

    for (hit, score) in scored {
        let score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };
        match merged.get_mut(&hit.chunk_id) {
            Some(entry) => entry.1 = entry.1.max(score),
            None => {
                order.push(hit.chunk_id.clone());
                merged.insert(hit.chunk_id.clone(), (hit, score));
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| merged.remove(&id))
        .collect()
}
