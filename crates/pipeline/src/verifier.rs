//! Grounding verification.
//!
//! A syntactic approximation of entailment: every substantive sentence of
//! the answer must share enough of its content words with the evidence it
//! cites (or, failing that, with the whole fused context), and every number
//! it states must appear somewhere in the evidence.
//!
//! Only sentences that are a disclaimer from start to end are exempt; a
//! leading `Note:` or `Update:` label is dropped and the rest is checked.

use crate::fusion::detect::extract_quantities;
use crate::fusion::FusedContext;
use crate::synthesizer::Answer;
use comply_core::PipelineSettings;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use unicode_segmentation::UnicodeSegmentation;

static MARKER_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[([^\]\s]+)\]").ok());

static NUMBER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").ok());

static BULLET_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]|\d{1,2}[.)])\s+").ok());

static LABEL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:update|note|important|disclaimer)\s*:\s*").ok());

/// Whole-sentence disclaimers and pointers. Anchored at both ends so a
/// familiar opening never exempts the claims that follow it.
static BOILERPLATE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^(?:
            (?:sources?|citations?|references?) |
            (?:please\s+)?(?:consult|contact|refer\s+to|check\s+with|confirm\s+with|verify\s+with)
                \s+(?:a|an|the|your)\s+(?:[a-z'-]+\s+){0,3}?
                (?:professional|accountant|advisor|adviser|lawyer|consultant|expert|authority|department|office|portal|website)s?
                (?:\s+(?:before|for|to)(?:\s+[a-z'-]+){1,4})? |
            please\s+(?:verify|confirm|check)\s+(?:this|these|the\s+latest(?:\s+[a-z'-]+){1,2}|the\s+(?:details|figures|rules))
                (?:\s+with\s+(?:the|your)(?:\s+[a-z'-]+){1,3})? |
            (?:this|it)\s+(?:is|does)\s+not\s+(?:constitute\s+)?(?:legal|professional|tax|financial)\s+advice |
            i\s+(?:do\s+not|don't)\s+have\s+enough\s+information
                (?:\s+(?:in|from)\s+the\s+(?:provided\s+)?(?:sources|evidence|context|documents))?
                (?:\s+to\s+answer\s+(?:this|that|it|the\s+question|your\s+question))? |
            i\s+have\s+insufficient\s+information
                (?:\s+to\s+answer\s+(?:this|that|it|the\s+question|your\s+question))? |
            (?:the\s+)?(?:figures|rules|information|limits)\s+may\s+have\s+changed
        )\s*:?[.!]?$",
    )
    .ok()
});

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "are", "was", "were", "has", "have", "had",
    "from", "its", "not", "can", "any", "all", "you", "your", "which", "will", "shall", "been",
    "may", "also", "under", "per", "into", "such", "than", "there", "their", "these", "those",
    "must", "should", "would", "could", "about", "our", "they", "them", "then", "what", "when",
];

/// Outcome of checking one answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub grounded: bool,
    /// Substantive sentences that failed the check, as written.
    pub unsupported: Vec<String>,
    /// Sentences stating a superseded figure without the newer one.
    pub stale: Vec<String>,
    /// Number of substantive sentences checked.
    pub checked: usize,
}

#[derive(Debug, Clone)]
pub struct GroundingVerifier {
    threshold: f32,
    min_tokens: usize,
}

impl GroundingVerifier {
    pub fn new(threshold: f32, min_tokens: usize) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            min_tokens,
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(settings.grounding_threshold, settings.min_sentence_tokens)
    }

    /// True only if every substantive sentence is grounded.
    pub fn verify(&self, answer: &Answer, ctx: &FusedContext) -> bool {
        self.check(answer, ctx).grounded
    }

    /// Overlap required when the sentence's cited chunks do not carry it.
    fn fallback_threshold(&self) -> f32 {
        self.threshold + (1.0 - self.threshold) / 2.0
    }

    pub fn check(&self, answer: &Answer, ctx: &FusedContext) -> VerificationReport {
        let full_tokens = token_set(ctx.chunks.iter().map(|c| c.content()));
        let full_numbers = number_set(ctx.chunks.iter().map(|c| c.content()));
        let cited_by_answer: Vec<&str> = answer.citations.iter().map(|c| c.chunk_id.as_str()).collect();

        let mut report = VerificationReport::default();

        for (raw, sentence) in sentences(&answer.text) {
            let body = strip_label(&sentence);
            if is_boilerplate(body) || word_count(body) < self.min_tokens {
                continue;
            }
            let content = content_tokens(body);
            if content.is_empty() {
                continue;
            }
            report.checked += 1;

            let markers = cited_ids(&raw, ctx);
            let cited: Vec<&str> = if markers.is_empty() {
                cited_by_answer.clone()
            } else {
                markers
            };
            let cited_tokens = token_set(
                ctx.chunks
                    .iter()
                    .filter(|c| cited.contains(&c.id()))
                    .map(|c| c.content()),
            );

            // Uncited support has to clear a higher bar.
            let supported = overlap(&content, &cited_tokens) >= self.threshold
                || overlap(&content, &full_tokens) >= self.fallback_threshold();
            let numbers_ok = number_set([body])
                .iter()
                .all(|n| full_numbers.contains(n));

            if !(supported && numbers_ok) {
                tracing::debug!(sentence = %sentence, supported, numbers_ok, "Unsupported sentence");
                report.unsupported.push(sentence);
            }
        }

        report.stale = stale_sentences(&answer.text, ctx);
        report.grounded = report.unsupported.is_empty();
        report
    }
}

/// `(original, cleaned)` pairs: split by line and sentence; the cleaned
/// form drops `[id]` markers and list bullets.
fn sentences(text: &str) -> Vec<(String, String)> {
    text.lines()
        .flat_map(|line| line.unicode_sentences())
        .filter_map(|raw| {
            let mut cleaned = raw.to_string();
            if let Some(re) = MARKER_RE.as_ref() {
                cleaned = re.replace_all(&cleaned, "").to_string();
            }
            if let Some(re) = BULLET_RE.as_ref() {
                cleaned = re.replace(&cleaned, "").to_string();
            }
            let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
            if cleaned.is_empty() {
                None
            } else {
                Some((raw.to_string(), cleaned))
            }
        })
        .collect()
}

fn cited_ids<'a>(raw: &str, ctx: &'a FusedContext) -> Vec<&'a str> {
    let Some(re) = MARKER_RE.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(raw)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| ctx.get(m.as_str()).map(|c| c.id()))
        .collect()
}

/// The sentence without a leading `Note:`/`Update:` style label.
fn strip_label(sentence: &str) -> &str {
    match LABEL_RE.as_ref().and_then(|re| re.find(sentence)) {
        Some(m) => &sentence[m.end()..],
        None => sentence,
    }
}

fn is_boilerplate(sentence: &str) -> bool {
    let sentence = sentence.trim();
    !sentence.chars().any(|c| c.is_ascii_digit())
        && BOILERPLATE_RE
            .as_ref()
            .is_some_and(|re| re.is_match(sentence))
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let w = w.to_lowercase();
            if w.chars().count() > 4 && w.ends_with('s') && !w.ends_with("ss") {
                w[..w.len() - 1].to_string()
            } else {
                w
            }
        })
}

fn word_count(sentence: &str) -> usize {
    words(sentence).count()
}

fn content_tokens(sentence: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    words(sentence)
        .filter(|w| w.chars().count() >= 3 || w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

fn token_set<'a>(texts: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
    texts.into_iter().flat_map(words).collect()
}

fn number_set<'a>(texts: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
    let Some(re) = NUMBER_RE.as_ref() else {
        return HashSet::new();
    };
    texts
        .into_iter()
        .flat_map(|t| re.find_iter(t).map(|m| m.as_str().replace(',', "")))
        .collect()
}

/// Fraction of `content` found in `evidence`.
fn overlap(content: &[String], evidence: &HashSet<String>) -> f32 {
    if content.is_empty() {
        return 0.0;
    }
    let hits = content.iter().filter(|w| evidence.contains(*w)).count();
    hits as f32 / content.len() as f32
}

/// Sentences repeating a superseded figure when the answer never states
/// the figure that replaced it.
fn stale_sentences(text: &str, ctx: &FusedContext) -> Vec<String> {
    let mut stale = Vec::new();
    let answer_keys: HashSet<_> = extract_quantities(text).iter().map(|q| q.key()).collect();

    for note in ctx.superseding() {
        let (Some(newer), Some(older)) = (ctx.get(&note.newer), ctx.get(&note.older)) else {
            continue;
        };
        let newer_keys: HashSet<_> = extract_quantities(newer.content())
            .iter()
            .map(|q| q.key())
            .collect();
        let older_only: HashSet<_> = extract_quantities(older.content())
            .iter()
            .map(|q| q.key())
            .filter(|k| !newer_keys.contains(k))
            .collect();

        let mentions_newer = answer_keys
            .iter()
            .any(|k| newer_keys.contains(k) && !older_only.contains(k));
        if mentions_newer {
            continue;
        }

        for (_, sentence) in sentences(text) {
            let states_old = extract_quantities(&sentence)
                .iter()
                .any(|q| older_only.contains(&q.key()));
            if states_old && !stale.contains(&sentence) {
                stale.push(sentence);
            }
        }
    }

    stale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{EvidenceChunk, SourceType};
    use crate::fusion::fuse;
    use crate::synthesizer::Citation;
    use chrono::Utc;

    const OLD: &str = "The collateral-free loan limit for MSEs is ₹5 Crore (2023).";
    const NEW: &str = "The collateral-free loan limit for MSEs is ₹10 Crore, effective April 1 2025.";
    const UDYAM: &str = "Udyam registration is free of cost and based on self-declaration. No documents need to be uploaded.";

    fn context() -> FusedContext {
        let now = Utc::now();
        fuse(
            vec![
                EvidenceChunk::new(OLD, SourceType::Local, "cgtmse.pdf", 0.9, now),
                EvidenceChunk::new(UDYAM, SourceType::Local, "udyam.pdf", 0.5, now),
            ],
            vec![EvidenceChunk::new(NEW, SourceType::Web, "https://sidbi.in/x", 0.7, now)],
            8,
        )
    }

    fn answer(text: &str) -> Answer {
        Answer {
            text: text.to_string(),
            citations: Vec::<Citation>::new(),
            grounded: false,
            attempt: 1,
            degraded: false,
        }
    }

    fn verifier() -> GroundingVerifier {
        GroundingVerifier::from_settings(&PipelineSettings::default())
    }

    #[test]
    fn test_verbatim_answer_is_grounded() {
        let ctx = context();
        let text = format!("{}\n{} {}", NEW, UDYAM, OLD);
        let report = verifier().check(&answer(&text), &ctx);
        assert!(report.grounded, "unsupported: {:?}", report.unsupported);
        assert!(report.checked >= 3);
    }

    #[test]
    fn test_markers_and_bullets_ignored() {
        let ctx = context();
        let id = ctx.chunks[0].id().to_string();
        let text = format!("- {} [{}]", ctx.chunks[0].content(), id);
        assert!(verifier().verify(&answer(&text), &ctx));
    }

    #[test]
    fn test_invented_claim_rejected() {
        let ctx = context();
        let text = format!("{} Exporters can also claim a special drawback rebate on freight insurance.", UDYAM);
        let report = verifier().check(&answer(&text), &ctx);
        assert!(!report.grounded);
        assert_eq!(report.unsupported.len(), 1);
        assert!(report.unsupported[0].starts_with("Exporters"));
    }

    #[test]
    fn test_unknown_number_rejected() {
        let ctx = context();
        let report = verifier().check(
            &answer("The collateral-free loan limit for MSEs is ₹25 Crore."),
            &ctx,
        );
        assert!(!report.grounded);
    }

    #[test]
    fn test_boilerplate_and_short_sentences_skipped() {
        let ctx = context();
        let text = "Please consult a chartered accountant before filing. Yes, indeed.\n\
I do not have enough information to answer this.\n\
Note: this is not legal advice.";
        let report = verifier().check(&answer(text), &ctx);
        assert!(report.grounded, "unsupported: {:?}", report.unsupported);
        assert_eq!(report.checked, 0);
    }

    #[test]
    fn test_labelled_or_hedged_claims_still_checked() {
        let ctx = fuse(
            vec![EvidenceChunk::new(UDYAM, SourceType::Local, "udyam.pdf", 0.5, Utc::now())],
            vec![],
            8,
        );
        let fabricated = [
            "Note: exporters can claim a special drawback rebate of ₹75 crore on freight.",
            "Update: the turnover ceiling for micro units is now ₹999 crore under the new rules.",
            "I do not have enough information about fees, but every trader must pay a ₹50,000 licence charge yearly.",
            "Please consult a chartered accountant because every importer owes a flat cess on machinery.",
        ];

        for text in fabricated {
            let report = verifier().check(&answer(text), &ctx);
            assert!(!report.grounded, "accepted: {}", text);
            assert_eq!(report.checked, 1, "{}", text);
        }

        let labelled = format!("Note: {}", UDYAM);
        assert!(verifier().verify(&answer(&labelled), &ctx));
    }

    #[test]
    fn test_uncited_support_needs_higher_overlap() {
        let ctx = context();
        let udyam_id = ctx
            .chunks
            .iter()
            .find(|c| c.content() == UDYAM)
            .map(|c| c.id().to_string())
            .unwrap();
        // 3 of 4 content terms come from the Udyam chunk.
        let sentence = "Udyam registration is free of penalties";

        let cited = format!("{} [{}].", sentence, udyam_id);
        assert!(verifier().verify(&answer(&cited), &ctx));

        let uncited = format!("{}.", sentence);
        assert!(!verifier().verify(&answer(&uncited), &ctx));
    }

    #[test]
    fn test_stale_figure_reported() {
        let ctx = context();
        let report = verifier().check(&answer(OLD), &ctx);
        assert!(report.grounded);
        assert_eq!(report.stale.len(), 1);

        let report = verifier().check(
            &answer("The limit was ₹5 Crore in 2023 and is ₹10 Crore from 2025."),
            &ctx,
        );
        assert!(report.stale.is_empty());
    }

    #[test]
    fn test_empty_context_rejects_claims() {
        let report = verifier().check(
            &answer("Every retailer must register under the Shops Act."),
            &FusedContext::default(),
        );
        assert!(!report.grounded);
    }
}
