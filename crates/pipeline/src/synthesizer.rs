//! Answer synthesis: render the fused evidence into a prompt, call the
//! provider once, and map the reply's citations back onto evidence chunks.

use crate::evidence::EvidenceChunk;
use crate::fusion::detect::extract_quantities;
use crate::fusion::{FreshnessReport, FusedContext};
use crate::generator::Generator;
use crate::profile::{render_profile, ProfileContext};
use comply_prompt::{PromptBuilder, SynthesisVars};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

pub const DEGRADED_ANSWER: &str = "The answer service is temporarily unavailable, so no answer \
could be generated from the evidence. Please try again shortly.";

pub const CHITCHAT_FALLBACK: &str =
    "I'm here to help with business compliance questions. What would you like to know?";

static CITATION_LINE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:[-*•]\s*)?\[([^\]\s]+)\]\s*[:\-–]?\s*["“”'](.+)["“”']\s*$"#).ok()
});

static ANSWER_HEADER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\banswer:").ok());

static CITATIONS_HEADER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bcitations:").ok());

static MARKER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[([0-9a-f]{6,})\]").ok());

static SUPERSESSION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:increas\w*|rais\w*|revis\w*|supersed\w*|replac\w*|previous\w*|earlier|updated?|amend\w*|changed|enhanc\w*|reduc\w*|lowered|decreas\w*|no longer)\b",
    )
    .ok()
});

/// A verbatim span of one evidence chunk supporting the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub chunk_id: String,
    pub quote: String,
}

/// One synthesized answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub text: String,
    pub citations: Vec<Citation>,
    /// Set by verification; false until then.
    pub grounded: bool,
    pub attempt: u8,
    /// The provider could not produce an answer.
    pub degraded: bool,
}

impl Answer {
    fn degraded(attempt: u8) -> Self {
        Self {
            text: DEGRADED_ANSWER.to_string(),
            citations: Vec::new(),
            grounded: false,
            attempt,
            degraded: true,
        }
    }
}

/// Sentences from a rejected attempt, fed back into the retry prompt.
#[derive(Debug, Clone, Default)]
pub struct CorrectiveNote {
    pub unsupported: Vec<String>,
}

pub struct AnswerSynthesizer {
    generator: Generator,
    prompts: Arc<PromptBuilder>,
}

impl AnswerSynthesizer {
    pub fn new(generator: Generator, prompts: Arc<PromptBuilder>) -> Self {
        Self { generator, prompts }
    }

    /// One provider call. Attempt 1 without a note, attempt 2 with one.
    ///
    /// A provider failure, timeout or empty answer yields a degraded answer
    /// rather than an error.
    pub async fn synthesize(
        &self,
        question: &str,
        profile: Option<&ProfileContext>,
        ctx: &FusedContext,
        freshness: &FreshnessReport,
        corrective: Option<&CorrectiveNote>,
    ) -> Answer {
        let attempt = if corrective.is_some() { 2 } else { 1 };

        let vars = SynthesisVars {
            question: question.trim().to_string(),
            profile: render_profile(profile),
            evidence: render_evidence(ctx),
            conflicts: render_conflicts(ctx),
            freshness: render_freshness(freshness),
            unsupported: corrective
                .map(|note| {
                    note.unsupported
                        .iter()
                        .map(|s| format!("- {}", s))
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .unwrap_or_default(),
        };

        let prompt = match self.prompts.synthesis(vars) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(error = %e, "Synthesis prompt failed");
                return Answer::degraded(attempt);
            }
        };

        let reply = match self.generator.complete(prompt, "answer synthesis", None).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    provider = self.generator.provider_name(),
                    attempt,
                    error = %e,
                    "Answer synthesis unavailable"
                );
                return Answer::degraded(attempt);
            }
        };

        let (text, citations) = parse_reply(&reply, ctx);
        if text.is_empty() {
            tracing::warn!(attempt, "Synthesis reply had no answer text");
            return Answer::degraded(attempt);
        }

        tracing::debug!(attempt, citations = citations.len(), "Synthesized answer");
        Answer {
            text,
            citations,
            grounded: false,
            attempt,
            degraded: false,
        }
    }

    /// Small talk for GENERAL questions; a fixed message if the provider fails.
    pub async fn chitchat(&self, question: &str, profile: Option<&ProfileContext>) -> String {
        let reply = match self.prompts.chitchat(question, &render_profile(profile)) {
            Ok(prompt) => self.generator.complete(prompt, "chit-chat", None).await,
            Err(e) => Err(e),
        };

        reply.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Chit-chat unavailable, using fallback");
            CHITCHAT_FALLBACK.to_string()
        })
    }
}

/// `[id] (LOCAL, source, 2023)` followed by the chunk text, per chunk.
pub fn render_evidence(ctx: &FusedContext) -> String {
    ctx.chunks
        .iter()
        .map(|c| {
            format!(
                "[{}] ({}, {}, {})\n{}",
                c.id(),
                c.source_type().to_string().to_uppercase(),
                c.source_id(),
                year_label(c),
                c.content().trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_conflicts(ctx: &FusedContext) -> String {
    ctx.superseding()
        .filter_map(|note| {
            let newer = ctx.get(&note.newer)?;
            let older = ctx.get(&note.older)?;
            Some(format!(
                "- {}: [{}] ({}, {}) supersedes [{}] ({}, {})",
                note.topic,
                newer.id(),
                newer.source_type().to_string().to_uppercase(),
                year_label(newer),
                older.id(),
                older.source_type().to_string().to_uppercase(),
                year_label(older),
            ))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_freshness(report: &FreshnessReport) -> String {
    if !report.needs_warning() {
        return String::new();
    }
    match report.earliest_year {
        Some(year) => format!(
            "Some local evidence dates from {} and no current web results were found. \
Tell the user the figures may have changed since and should be confirmed with the issuing authority.",
            year
        ),
        None => String::new(),
    }
}

fn year_label(chunk: &EvidenceChunk) -> String {
    chunk
        .published_year()
        .map(|y| y.to_string())
        .unwrap_or_else(|| "undated".to_string())
}

/// Split a reply into answer text and validated citations.
///
/// A citation survives only if its quote is a verbatim substring of the
/// chunk it names, or failing that of some other chunk in the context (the
/// model sometimes mislabels ids). Sentences carrying an `[id]` marker that
/// are themselves verbatim evidence are cited too.
pub fn parse_reply(reply: &str, ctx: &FusedContext) -> (String, Vec<Citation>) {
    let (answer_part, citation_part) = split_sections(reply);
    let text = answer_part.trim().to_string();

    let mut citations = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |citation: Citation| {
        if seen.insert((citation.chunk_id.clone(), citation.quote.clone())) {
            citations.push(citation);
        }
    };

    if let Some(re) = CITATION_LINE_RE.as_ref() {
        for line in citation_part.lines() {
            if let Some(caps) = re.captures(line) {
                let (Some(id), Some(quote)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };
                match resolve_citation(ctx, id.as_str(), quote.as_str()) {
                    Some(citation) => push(citation),
                    None => tracing::debug!(id = id.as_str(), "Dropped unverifiable citation"),
                }
            }
        }
    }

    if let Some(re) = MARKER_RE.as_ref() {
        for line in text.lines() {
            for caps in re.captures_iter(line) {
                let Some(id) = caps.get(1) else { continue };
                let sentence = re.replace_all(line, "");
                if let Some(citation) = resolve_citation(ctx, id.as_str(), &sentence) {
                    push(citation);
                }
            }
        }
    }

    (text, citations)
}

fn split_sections(reply: &str) -> (&str, &str) {
    let answer_at = ANSWER_HEADER_RE.as_ref().and_then(|re| re.find(reply));
    let citations_at = CITATIONS_HEADER_RE.as_ref().and_then(|re| re.find(reply));

    match (answer_at, citations_at) {
        (Some(a), Some(c)) if a.end() <= c.start() => {
            (&reply[a.end()..c.start()], &reply[c.end()..])
        }
        (Some(a), _) => (&reply[a.end()..], ""),
        (None, Some(c)) => (&reply[..c.start()], &reply[c.end()..]),
        (None, None) => (reply, ""),
    }
}

fn resolve_citation(ctx: &FusedContext, id: &str, quote: &str) -> Option<Citation> {
    let quote = quote
        .trim()
        .trim_end_matches("...")
        .trim_end_matches('…')
        .trim();
    if quote.is_empty() {
        return None;
    }

    let chunk = ctx
        .get(id)
        .filter(|c| c.content().contains(quote))
        .or_else(|| ctx.chunks.iter().find(|c| c.content().contains(quote)))?;

    Some(Citation {
        chunk_id: chunk.id().to_string(),
        quote: quote.to_string(),
    })
}

/// [`update_sentences`] unless the text already uses supersession wording.
pub fn supersession_notice(text: &str, ctx: &FusedContext) -> Option<(String, Vec<Citation>)> {
    if SUPERSESSION_RE
        .as_ref()
        .is_some_and(|re| re.is_match(text))
    {
        return None;
    }
    update_sentences(ctx)
}

/// An explicit "Update:" sentence per superseded figure, with citations
/// quoting the figures from both chunks. `None` if nothing is superseded.
pub fn update_sentences(ctx: &FusedContext) -> Option<(String, Vec<Citation>)> {
    let notes: Vec<_> = ctx.superseding().collect();
    if notes.is_empty() {
        return None;
    }

    let mut sentences = Vec::new();
    let mut citations = Vec::new();

    for note in notes {
        let (Some(newer), Some(older)) = (ctx.get(&note.newer), ctx.get(&note.older)) else {
            continue;
        };

        let newer_figures = extract_quantities(newer.content());
        let older_figures = extract_quantities(older.content());
        let new_figure = newer_figures
            .iter()
            .find(|q| older_figures.iter().all(|o| o.key() != q.key()));
        let old_figure = older_figures.iter().find(|q| {
            q.kind == new_figure.map_or(q.kind, |n| n.kind)
                && newer_figures.iter().all(|n| n.key() != q.key())
        });

        let sentence = match (new_figure, old_figure) {
            (Some(new), Some(old)) => {
                citations.push(Citation {
                    chunk_id: newer.id().to_string(),
                    quote: new.raw.clone(),
                });
                citations.push(Citation {
                    chunk_id: older.id().to_string(),
                    quote: old.raw.clone(),
                });
                format!(
                    "Update: {} ({}) supersedes the earlier {} ({}) for {}.",
                    new.raw,
                    year_label(newer),
                    old.raw,
                    year_label(older),
                    note.topic
                )
            }
            (Some(new), None) => {
                citations.push(Citation {
                    chunk_id: newer.id().to_string(),
                    quote: new.raw.clone(),
                });
                format!(
                    "Update: {} ({}) supersedes the earlier figure ({}) for {}.",
                    new.raw,
                    year_label(newer),
                    year_label(older),
                    note.topic
                )
            }
            _ => format!(
                "Update: the {} source supersedes the earlier {} source for {}.",
                year_label(newer),
                year_label(older),
                note.topic
            ),
        };
        sentences.push(sentence);
    }

    if sentences.is_empty() {
        None
    } else {
        Some((sentences.join(" "), citations))
    }
}
