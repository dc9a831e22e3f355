//! What `ask` hands back to the presentation layer.

use crate::fusion::{ConflictNote, FreshnessReport};
use crate::intent::Intent;
use crate::orchestrator::PipelineState;
use crate::retriever::SourceStatus;
use serde::Serialize;

/// A citation resolved to the source it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationRef {
    pub source_id: String,
    pub quote: String,
    pub chunk_id: String,
}

/// The final answer to one question. Never mutated after it is returned.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<CitationRef>,
    pub grounded: bool,
    /// Shown to the caller when the answer could not be fully verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    pub trace: PipelineTrace,
}

/// How the request travelled through the pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTrace {
    pub request_id: String,
    pub intent: Option<Intent>,
    pub states: Vec<PipelineState>,
    pub local: SourceStatus,
    pub web: SourceStatus,
    pub synthesizer_calls: u32,
    pub conflicts: Vec<ConflictNote>,
    pub freshness: FreshnessReport,
    pub unsupported: Vec<String>,
    pub degraded: bool,
    pub attempt: u8,
}

impl PipelineTrace {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            intent: None,
            states: Vec::new(),
            local: SourceStatus::Skipped,
            web: SourceStatus::Skipped,
            synthesizer_calls: 0,
            conflicts: Vec::new(),
            freshness: FreshnessReport::default(),
            unsupported: Vec::new(),
            degraded: false,
            attempt: 0,
        }
    }

    /// Record a state transition.
    pub(crate) fn enter(&mut self, next: PipelineState) {
        tracing::debug!(state = ?next, "Pipeline transition");
        self.states.push(next);
    }
}
