//! The answering state machine.
//!
//! ```text
//! CLASSIFYING → RETRIEVING → FUSING → SYNTHESIZING(1) → VERIFYING
//!     → DONE
//!     → SYNTHESIZING(2) → VERIFYING(final) → DONE
//! ```
//!
//! Every path ends in `DONE` with an answer. The corrective retry happens
//! at most once per request. The only error `ask_with_cancel` returns is
//! [`AppError::Cancelled`].

use crate::control::guard;
use crate::fusion::{fuse, FreshnessReport, FusedContext};
use crate::generator::Generator;
use crate::intent::{Intent, IntentClassifier};
use crate::profile::ProfileContext;
use crate::response::{AskResponse, CitationRef, PipelineTrace};
use crate::retriever::{EvidenceRetriever, Retrieval, SourceStatus};
use crate::synthesizer::{
    supersession_notice, update_sentences, Answer, AnswerSynthesizer, Citation, CorrectiveNote,
};
use crate::verifier::{GroundingVerifier, VerificationReport};
use chrono::{Datelike, Utc};
use comply_core::{AppError, AppResult, PipelineSettings};
use comply_knowledge::{CorpusIndex, WebSearchProvider};
use comply_llm::LlmClient;
use comply_prompt::{PromptBuilder, PromptSet};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

const EMPTY_QUESTION: &str = "Please ask a compliance question, for example about registrations, \
taxes, licences or filing deadlines.";

const NO_EVIDENCE_AVAILABLE: &str = "I have insufficient information to answer this question: \
no evidence available, because the document corpus and web search could not be reached.";

const NO_EVIDENCE_FOUND: &str = "I have insufficient information to answer this question: \
no relevant evidence was found in the document corpus or on the web.";

pub const UNGROUNDED_DISCLAIMER: &str = "Some statements in this answer could not be verified \
against the retrieved sources. Treat it as low-confidence guidance and confirm with the issuing \
authority or a compliance professional.";

pub const GENERATION_DISCLAIMER: &str =
    "The text generation service was unavailable, so no answer was generated.";

const ABORTED_ANSWER: &str = "The request was stopped before an answer was produced.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Classifying,
    Retrieving,
    Fusing,
    Synthesizing {
        attempt: u8,
    },
    Verifying {
        #[serde(rename = "finalPass")]
        final_pass: bool,
    },
    Done,
}

/// Retrieval and fusion without generation, for inspecting evidence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub local: SourceStatus,
    pub web: SourceStatus,
    pub context: FusedContext,
    pub freshness: FreshnessReport,
}

/// One configured answering pipeline.
///
/// Holds only read-only collaborators and settings; every call to
/// [`Pipeline::ask`] owns its own evidence and answers, so one instance can
/// serve concurrent requests.
pub struct Pipeline {
    classifier: IntentClassifier,
    retriever: EvidenceRetriever,
    synthesizer: AnswerSynthesizer,
    verifier: GroundingVerifier,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        corpus: Option<Arc<dyn CorpusIndex>>,
        web: Option<Arc<dyn WebSearchProvider>>,
        prompts: &PromptSet,
        settings: PipelineSettings,
    ) -> AppResult<Self> {
        let builder = Arc::new(PromptBuilder::new(prompts)?);
        let generator = Generator::new(llm, model, &settings);

        Ok(Self {
            classifier: IntentClassifier::new(generator.clone(), builder.clone()),
            retriever: EvidenceRetriever::new(corpus, web, &settings),
            synthesizer: AnswerSynthesizer::new(generator, builder),
            verifier: GroundingVerifier::from_settings(&settings),
            settings,
        })
    }

    /// Answer a question. Always returns an answer.
    pub async fn ask(&self, question: &str, profile: Option<&ProfileContext>) -> AskResponse {
        let request_id = Uuid::new_v4().to_string();
        match self
            .execute(question, profile, &CancellationToken::new(), request_id.clone())
            .await
        {
            Ok(response) => response,
            Err(e) => aborted_response(request_id, &e),
        }
    }

    /// Answer a question unless `cancel` fires first.
    ///
    /// Cancellation drops every in-flight retrieval and generation call and
    /// skips all remaining transitions.
    pub async fn ask_with_cancel(
        &self,
        question: &str,
        profile: Option<&ProfileContext>,
        cancel: CancellationToken,
    ) -> AppResult<AskResponse> {
        self.execute(question, profile, &cancel, Uuid::new_v4().to_string())
            .await
    }

    async fn execute(
        &self,
        question: &str,
        profile: Option<&ProfileContext>,
        cancel: &CancellationToken,
        request_id: String,
    ) -> AppResult<AskResponse> {
        let span = tracing::info_span!("ask", request_id = %request_id);

        let result = self
            .run(question, profile, cancel, request_id)
            .instrument(span)
            .await;

        if let Err(AppError::Cancelled) = &result {
            tracing::info!("Request cancelled");
        }
        result
    }

    /// Query both sources for `question` and fuse the results.
    pub async fn inspect(&self, question: &str) -> Inspection {
        let (local, web) = self.retrieve(question.trim(), Intent::Hybrid).await;
        let context = fuse(local.chunks, web.chunks, self.window());
        let freshness = self.freshness(&context);

        Inspection {
            local: local.status,
            web: web.status,
            context,
            freshness,
        }
    }

    async fn run(
        &self,
        question: &str,
        profile: Option<&ProfileContext>,
        cancel: &CancellationToken,
        request_id: String,
    ) -> AppResult<AskResponse> {
        let mut trace = PipelineTrace::new(request_id);
        let question = question.trim();

        if question.is_empty() {
            trace.enter(PipelineState::Done);
            return Ok(plain_response(trace, EMPTY_QUESTION, true));
        }

        trace.enter(PipelineState::Classifying);
        let intent = guard(cancel, self.classifier.classify(question, profile)).await?;
        trace.intent = Some(intent);
        tracing::info!(%intent, "Answering question");

        if intent == Intent::General {
            let reply = guard(cancel, self.synthesizer.chitchat(question, profile)).await?;
            trace.enter(PipelineState::Done);
            return Ok(plain_response(trace, &reply, true));
        }

        trace.enter(PipelineState::Retrieving);
        let (local, web) = guard(cancel, self.retrieve(question, intent)).await?;
        trace.local = local.status.clone();
        trace.web = web.status.clone();

        if local.chunks.is_empty() && web.chunks.is_empty() {
            let all_down = [&local.status, &web.status]
                .iter()
                .all(|s| s.is_unavailable() || **s == SourceStatus::Skipped);
            tracing::warn!(all_down, "No evidence retrieved");
            trace.enter(PipelineState::Done);
            let message = if all_down {
                NO_EVIDENCE_AVAILABLE
            } else {
                NO_EVIDENCE_FOUND
            };
            return Ok(plain_response(trace, message, false));
        }

        trace.enter(PipelineState::Fusing);
        let ctx = fuse(local.chunks, web.chunks, self.window());
        let freshness = self.freshness(&ctx);
        trace.conflicts = ctx.conflicts.clone();
        trace.freshness = freshness.clone();

        trace.enter(PipelineState::Synthesizing { attempt: 1 });
        trace.synthesizer_calls += 1;
        let first = guard(
            cancel,
            self.synthesizer
                .synthesize(question, profile, &ctx, &freshness, None),
        )
        .await?;

        if first.degraded {
            trace.degraded = true;
            trace.attempt = first.attempt;
            trace.enter(PipelineState::Done);
            return Ok(respond(trace, first, &ctx, Some(GENERATION_DISCLAIMER)));
        }

        trace.enter(PipelineState::Verifying { final_pass: false });
        let report = self.verifier.check(&first, &ctx);

        let (mut answer, report) = if report.grounded {
            (first, report)
        } else {
            tracing::info!(
                unsupported = report.unsupported.len(),
                "Answer not grounded, retrying once"
            );
            self.correct(question, profile, &ctx, &freshness, cancel, &mut trace, first, report)
                .await?
        };

        answer.grounded = report.grounded;
        trace.attempt = answer.attempt;
        trace.unsupported = report.unsupported.clone();

        let notice = if report.stale.is_empty() {
            supersession_notice(&answer.text, &ctx)
        } else {
            update_sentences(&ctx)
        };
        if let Some((sentence, citations)) = notice {
            answer.text = format!("{}\n\n{}", answer.text.trim_end(), sentence);
            for citation in citations {
                if !answer.citations.contains(&citation) {
                    answer.citations.push(citation);
                }
            }
        }

        let disclaimer = if answer.grounded {
            None
        } else {
            tracing::warn!("Returning answer that failed verification");
            Some(UNGROUNDED_DISCLAIMER)
        };

        trace.enter(PipelineState::Done);
        Ok(respond(trace, answer, &ctx, disclaimer))
    }

    /// The single corrective attempt. Falls back to the first answer when
    /// the provider fails on the retry.
    #[allow(clippy::too_many_arguments)]
    async fn correct(
        &self,
        question: &str,
        profile: Option<&ProfileContext>,
        ctx: &FusedContext,
        freshness: &FreshnessReport,
        cancel: &CancellationToken,
        trace: &mut PipelineTrace,
        first: Answer,
        first_report: VerificationReport,
    ) -> AppResult<(Answer, VerificationReport)> {
        let note = CorrectiveNote {
            unsupported: first_report.unsupported.clone(),
        };

        trace.enter(PipelineState::Synthesizing { attempt: 2 });
        trace.synthesizer_calls += 1;
        let second = guard(
            cancel,
            self.synthesizer
                .synthesize(question, profile, ctx, freshness, Some(&note)),
        )
        .await?;

        trace.enter(PipelineState::Verifying { final_pass: true });
        if second.degraded {
            tracing::warn!("Corrective attempt unavailable, keeping the first answer");
            return Ok((first, first_report));
        }

        let report = self.verifier.check(&second, ctx);
        Ok((second, report))
    }

    async fn retrieve(&self, question: &str, intent: Intent) -> (Retrieval, Retrieval) {
        let local = async {
            if intent.wants_local() {
                self.retriever
                    .retrieve_local(question, self.settings.local_k)
                    .await
            } else {
                Retrieval::skipped()
            }
        };
        let web = async {
            if intent.wants_web() {
                self.retriever.retrieve_web(question, self.settings.web_k).await
            } else {
                Retrieval::skipped()
            }
        };

        tokio::join!(local, web)
    }

    fn window(&self) -> usize {
        self.settings.evidence_window.max(1)
    }

    fn freshness(&self, ctx: &FusedContext) -> FreshnessReport {
        FreshnessReport::assess(ctx, Utc::now().year(), self.settings.stale_after_years)
    }
}

/// The answer for a request that stopped early, traced under its own id.
pub(crate) fn aborted_response(request_id: String, error: &AppError) -> AskResponse {
    tracing::error!(request_id = %request_id, error = %error, "Pipeline aborted");
    let mut trace = PipelineTrace::new(request_id);
    trace.degraded = true;
    trace.enter(PipelineState::Done);
    AskResponse {
        answer: ABORTED_ANSWER.to_string(),
        citations: Vec::new(),
        grounded: false,
        disclaimer: Some(error.to_string()),
        trace,
    }
}

fn plain_response(trace: PipelineTrace, text: &str, grounded: bool) -> AskResponse {
    AskResponse {
        answer: text.to_string(),
        citations: Vec::new(),
        grounded,
        disclaimer: None,
        trace,
    }
}

fn respond(
    trace: PipelineTrace,
    answer: Answer,
    ctx: &FusedContext,
    disclaimer: Option<&str>,
) -> AskResponse {
    AskResponse {
        citations: answer
            .citations
            .iter()
            .filter_map(|c| citation_ref(c, ctx))
            .collect(),
        answer: answer.text,
        grounded: answer.grounded,
        disclaimer: disclaimer.map(str::to_string),
        trace,
    }
}

fn citation_ref(citation: &Citation, ctx: &FusedContext) -> Option<CitationRef> {
    let chunk = ctx.get(&citation.chunk_id)?;
    Some(CitationRef {
        source_id: chunk.source_id().to_string(),
        quote: citation.quote.clone(),
        chunk_id: citation.chunk_id.clone(),
    })
}
