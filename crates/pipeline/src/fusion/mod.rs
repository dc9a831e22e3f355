//! Recency fusion: merge local and web evidence into one ranked context and
//! record where newer evidence supersedes older evidence.
//!
//! Everything here is a pure function of its inputs. Chunks are compared in
//! id order and every sort has a total tie-break, so identical evidence sets
//! always produce an identical [`FusedContext`].

pub mod detect;
mod freshness;

pub use freshness::FreshnessReport;

use crate::evidence::{EvidenceChunk, SourceType};
use detect::{detect_year, extract_quantities, significant_terms, QuantityKind};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Shared content words needed before two chunks count as the same topic.
const MIN_SHARED_TERMS: usize = 2;

/// Topic labels keep at most this many shared terms.
const TOPIC_TERMS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    /// The chunks state different figures; the newer one must be followed.
    PreferNewer,
    /// Same figures at different dates; nothing to resolve.
    NoConflict,
}

/// Two chunks about the same topic with different dates or figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictNote {
    pub topic: String,
    pub older: String,
    pub newer: String,
    pub resolution: Resolution,
}

/// Deduplicated, recency-ranked evidence for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FusedContext {
    pub chunks: Vec<EvidenceChunk>,
    pub conflicts: Vec<ConflictNote>,
}

impl FusedContext {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&EvidenceChunk> {
        self.chunks.iter().find(|c| c.id() == id)
    }

    /// Notes where a newer chunk overrides an older figure.
    pub fn superseding(&self) -> impl Iterator<Item = &ConflictNote> {
        self.conflicts
            .iter()
            .filter(|n| n.resolution == Resolution::PreferNewer)
    }
}

struct Analyzed {
    chunk: EvidenceChunk,
    terms: BTreeSet<String>,
    figures: BTreeMap<QuantityKind, BTreeSet<i64>>,
}

impl Analyzed {
    fn new(chunk: EvidenceChunk) -> Self {
        let chunk = match chunk.published_year() {
            Some(_) => chunk,
            None => {
                let year = detect_year(chunk.content());
                chunk.with_published_year(year)
            }
        };

        let mut figures: BTreeMap<QuantityKind, BTreeSet<i64>> = BTreeMap::new();
        for q in extract_quantities(chunk.content()) {
            let (kind, value) = q.key();
            figures.entry(kind).or_default().insert(value);
        }

        Self {
            terms: significant_terms(chunk.content()),
            figures,
            chunk,
        }
    }
}

/// Merge local and web evidence, keeping at most `window` chunks.
pub fn fuse(local: Vec<EvidenceChunk>, web: Vec<EvidenceChunk>, window: usize) -> FusedContext {
    let mut unique: BTreeMap<String, EvidenceChunk> = BTreeMap::new();
    for chunk in local.into_iter().chain(web) {
        let replace = unique
            .get(chunk.id())
            .map_or(true, |existing| outranks(&chunk, existing));
        if replace {
            unique.insert(chunk.id().to_string(), chunk);
        }
    }

    let analyzed: Vec<Analyzed> = unique.into_values().map(Analyzed::new).collect();

    let mut conflicts = Vec::new();
    for (i, a) in analyzed.iter().enumerate() {
        for b in &analyzed[i + 1..] {
            if let Some(note) = compare_pair(a, b) {
                conflicts.push(note);
            }
        }
    }

    let winners = conflict_winners(&conflicts);
    let mut chunks: Vec<EvidenceChunk> = analyzed.into_iter().map(|a| a.chunk).collect();
    chunks.sort_by(|a, b| {
        let tier_a = winners.contains(a.id());
        let tier_b = winners.contains(b.id());
        tier_b
            .cmp(&tier_a)
            .then_with(|| b.published_year().is_some().cmp(&a.published_year().is_some()))
            .then_with(|| b.relevance().total_cmp(&a.relevance()))
            .then_with(|| year_desc(a.published_year(), b.published_year()))
            .then_with(|| a.id().cmp(b.id()))
    });
    chunks.truncate(window);

    let kept: HashSet<&str> = chunks.iter().map(EvidenceChunk::id).collect();
    conflicts.retain(|n| kept.contains(n.older.as_str()) && kept.contains(n.newer.as_str()));

    tracing::debug!(
        chunks = chunks.len(),
        conflicts = conflicts.len(),
        "Fused evidence"
    );

    FusedContext { chunks, conflicts }
}

/// Whether `candidate` should replace `existing` as the copy of a duplicate.
fn outranks(candidate: &EvidenceChunk, existing: &EvidenceChunk) -> bool {
    match candidate.relevance().total_cmp(&existing.relevance()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => {
            candidate.source_type() == SourceType::Web
                && existing.source_type() == SourceType::Local
        }
    }
}

fn compare_pair(a: &Analyzed, b: &Analyzed) -> Option<ConflictNote> {
    let shared: Vec<&String> = a.terms.intersection(&b.terms).collect();
    if shared.len() < MIN_SHARED_TERMS {
        return None;
    }

    let kinds: Vec<&QuantityKind> = a
        .figures
        .keys()
        .filter(|k| b.figures.contains_key(*k))
        .collect();
    if kinds.is_empty() {
        return None;
    }

    let same_figures = kinds.iter().all(|k| a.figures.get(*k) == b.figures.get(*k));
    let same_year = a.chunk.published_year() == b.chunk.published_year();
    if same_figures && same_year {
        return None;
    }

    let (newer, older) = match recency(&a.chunk, &b.chunk) {
        Ordering::Less => (&b.chunk, &a.chunk),
        _ => (&a.chunk, &b.chunk),
    };

    Some(ConflictNote {
        topic: shared
            .iter()
            .take(TOPIC_TERMS)
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        older: older.id().to_string(),
        newer: newer.id().to_string(),
        resolution: if same_figures {
            Resolution::NoConflict
        } else {
            Resolution::PreferNewer
        },
    })
}

/// `Greater` when `a` is the fresher of the two.
///
/// Later year first; a dated chunk beats an undated one; then web beats
/// local, higher relevance, and finally the smaller id.
pub fn recency(a: &EvidenceChunk, b: &EvidenceChunk) -> Ordering {
    let by_year = match (a.published_year(), b.published_year()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    };

    by_year
        .then_with(|| a.source_type().cmp(&b.source_type()))
        .then_with(|| a.relevance().total_cmp(&b.relevance()))
        .then_with(|| b.id().cmp(a.id()))
}

fn conflict_winners(conflicts: &[ConflictNote]) -> HashSet<String> {
    let losers: HashSet<&str> = conflicts
        .iter()
        .filter(|n| n.resolution == Resolution::PreferNewer)
        .map(|n| n.older.as_str())
        .collect();

    conflicts
        .iter()
        .filter(|n| n.resolution == Resolution::PreferNewer)
        .map(|n| n.newer.as_str())
        .filter(|id| !losers.contains(id))
        .map(str::to_string)
        .collect()
}

/// Newest first, undated last.
fn year_desc(a: Option<i32>, b: Option<i32>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn chunk(text: &str, source: SourceType, relevance: f32) -> EvidenceChunk {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        EvidenceChunk::new(text, source, format!("{}-src", source), relevance, at)
    }

    const LOCAL_OLD: &str =
        "The collateral-free loan limit for MSEs under CGTMSE is ₹5 Crore (2023).";
    const WEB_NEW: &str =
        "The collateral-free loan limit for MSEs under CGTMSE is ₹10 Crore, effective April 1 2025.";

    #[test]
    fn test_dedup_prefers_higher_relevance_then_web() {
        let ctx = fuse(
            vec![chunk("Udyam registration is free.", SourceType::Local, 0.9)],
            vec![chunk("udyam  registration is FREE.", SourceType::Web, 0.4)],
            8,
        );
        assert_eq!(ctx.chunks.len(), 1);
        assert_eq!(ctx.chunks[0].source_type(), SourceType::Local);

        let ctx = fuse(
            vec![chunk("Udyam registration is free.", SourceType::Local, 0.5)],
            vec![chunk("Udyam registration is free.", SourceType::Web, 0.5)],
            8,
        );
        assert_eq!(ctx.chunks[0].source_type(), SourceType::Web);
    }

    #[test]
    fn test_newer_web_figure_supersedes_local() {
        let ctx = fuse(
            vec![chunk(LOCAL_OLD, SourceType::Local, 0.95)],
            vec![chunk(WEB_NEW, SourceType::Web, 0.6)],
            8,
        );

        assert_eq!(ctx.conflicts.len(), 1);
        let note = &ctx.conflicts[0];
        assert_eq!(note.resolution, Resolution::PreferNewer);

        let newer = ctx.get(&note.newer).unwrap();
        let older = ctx.get(&note.older).unwrap();
        assert_eq!(newer.source_type(), SourceType::Web);
        assert_eq!(newer.published_year(), Some(2025));
        assert_eq!(older.published_year(), Some(2023));
        assert!(note.topic.contains("collateral"));

        // The winner leads even with lower relevance.
        assert_eq!(ctx.chunks[0].id(), newer.id());
    }

    #[test]
    fn test_same_figure_different_year_is_no_conflict() {
        let ctx = fuse(
            vec![chunk("Audit threshold for companies is ₹1 crore as of 2022.", SourceType::Local, 0.5)],
            vec![chunk("Audit threshold for companies remains ₹1 crore in 2025.", SourceType::Web, 0.5)],
            8,
        );
        assert_eq!(ctx.conflicts.len(), 1);
        assert_eq!(ctx.conflicts[0].resolution, Resolution::NoConflict);
        assert_eq!(ctx.superseding().count(), 0);
    }

    #[test]
    fn test_year_tie_goes_to_web() {
        let ctx = fuse(
            vec![chunk("Late filing penalty for GSTR returns is 18% interest.", SourceType::Local, 0.9)],
            vec![chunk("Late filing penalty for GSTR returns is 24% interest.", SourceType::Web, 0.1)],
            8,
        );
        let note = &ctx.conflicts[0];
        assert_eq!(note.resolution, Resolution::PreferNewer);
        assert_eq!(ctx.get(&note.newer).unwrap().source_type(), SourceType::Web);
    }

    #[test]
    fn test_unrelated_chunks_do_not_conflict() {
        let ctx = fuse(
            vec![chunk("Udyam registration costs ₹0 and is online.", SourceType::Local, 0.5)],
            vec![chunk("Trade licence renewal fee in Delhi is ₹500.", SourceType::Web, 0.5)],
            8,
        );
        assert!(ctx.conflicts.is_empty());
    }

    #[test]
    fn test_window_caps_and_prunes_notes() {
        let ctx = fuse(
            vec![
                chunk(LOCAL_OLD, SourceType::Local, 0.1),
                chunk("Udyam registration became free in 2020.", SourceType::Local, 0.9),
            ],
            vec![chunk(WEB_NEW, SourceType::Web, 0.2)],
            2,
        );
        assert_eq!(ctx.chunks.len(), 2);
        assert!(ctx.get(&content_of(WEB_NEW)).is_some());
        assert!(ctx.conflicts.is_empty());
    }

    #[test]
    fn test_undated_sorts_after_dated() {
        let ctx = fuse(
            vec![
                chunk("Shops must display the registration certificate.", SourceType::Local, 0.5),
                chunk("Professional tax slabs were revised in 2024.", SourceType::Local, 0.5),
            ],
            vec![],
            8,
        );
        assert_eq!(ctx.chunks[0].published_year(), Some(2024));
        assert_eq!(ctx.chunks[1].published_year(), None);

        let ctx = fuse(
            vec![
                chunk("Shops must display the registration certificate.", SourceType::Local, 0.9),
                chunk("Professional tax slabs were revised in 2024.", SourceType::Local, 0.5),
                chunk("Trade licences were made renewable online in 2021.", SourceType::Local, 0.7),
            ],
            vec![],
            8,
        );
        let years: Vec<_> = ctx.chunks.iter().map(|c| c.published_year()).collect();
        assert_eq!(years, vec![Some(2021), Some(2024), None]);
    }

    #[test]
    fn test_window_keeps_dated_over_more_relevant_undated() {
        let ctx = fuse(
            vec![
                chunk("Shops must display the registration certificate.", SourceType::Local, 0.9),
                chunk("Professional tax slabs were revised in 2024.", SourceType::Local, 0.5),
            ],
            vec![],
            1,
        );
        assert_eq!(ctx.chunks.len(), 1);
        assert_eq!(ctx.chunks[0].published_year(), Some(2024));
    }

    #[test]
    fn test_fuse_is_deterministic() {
        let local = vec![
            chunk(LOCAL_OLD, SourceType::Local, 0.7),
            chunk("Udyam registration is free.", SourceType::Local, 0.7),
        ];
        let web = vec![chunk(WEB_NEW, SourceType::Web, 0.7)];

        let first = serde_json::to_string(&fuse(local.clone(), web.clone(), 8)).unwrap();
        for _ in 0..10 {
            let again = serde_json::to_string(&fuse(local.clone(), web.clone(), 8)).unwrap();
            assert_eq!(first, again);
        }

        let mut reversed = local.clone();
        reversed.reverse();
        let swapped = serde_json::to_string(&fuse(reversed, web, 8)).unwrap();
        assert_eq!(first, swapped);
    }

    fn content_of(text: &str) -> String {
        crate::evidence::content_id(text)
    }
}
