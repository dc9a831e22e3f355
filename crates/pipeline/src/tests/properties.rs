//! Properties that must hold for every request, checked over many inputs.

use super::support::{hit, is_classifier, pipeline, web_result, MockCorpus, MockWeb, ScriptedLlm};
use crate::evidence::{content_id, EvidenceChunk, SourceType};
use crate::fusion::fuse;
use crate::synthesizer::Answer;
use crate::verifier::GroundingVerifier;
use chrono::{TimeZone, Utc};
use comply_core::PipelineSettings;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const PASSAGES: &[&str] = &[
    "The collateral-free loan limit for MSEs is ₹5 Crore (2023).",
    "Udyam registration is free of cost and based on self-declaration.",
    "GST registration is mandatory when aggregate turnover exceeds ₹40 lakh for goods suppliers.",
    "Buyers must pay MSE suppliers within 45 days under Section 43B(h) of the Income Tax Act.",
    "Late payment attracts compound interest at three times the bank rate notified by RBI.",
];

const WEB_PASSAGES: &[&str] = &[
    "The collateral-free loan limit for MSEs is ₹10 Crore, effective April 1 2025.",
    "GST registration threshold for goods suppliers remains ₹40 lakh in 2025.",
];

fn local_chunks() -> Vec<EvidenceChunk> {
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    PASSAGES
        .iter()
        .enumerate()
        .map(|(i, p)| {
            EvidenceChunk::new(*p, SourceType::Local, format!("doc-{}", i), 0.9 - i as f32 * 0.1, at)
        })
        .collect()
}

fn web_chunks() -> Vec<EvidenceChunk> {
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    WEB_PASSAGES
        .iter()
        .enumerate()
        .map(|(i, p)| EvidenceChunk::new(*p, SourceType::Web, format!("https://news/{}", i), 0.7, at))
        .collect()
}

#[test]
fn test_fuse_is_byte_identical_across_runs() {
    let expected = serde_json::to_string(&fuse(local_chunks(), web_chunks(), 8)).unwrap();

    for rotation in 0..PASSAGES.len() {
        let mut local = local_chunks();
        local.rotate_left(rotation);
        let mut web = web_chunks();
        if rotation % 2 == 1 {
            web.reverse();
        }
        let again = serde_json::to_string(&fuse(local, web, 8)).unwrap();
        assert_eq!(expected, again, "rotation {}", rotation);
    }
}

#[test]
fn test_conflict_pairs_respect_year_order() {
    let ctx = fuse(local_chunks(), web_chunks(), 8);
    assert!(!ctx.conflicts.is_empty());
    for note in &ctx.conflicts {
        let newer = ctx.get(&note.newer).unwrap();
        let older = ctx.get(&note.older).unwrap();
        if let (Some(n), Some(o)) = (newer.published_year(), older.published_year()) {
            assert!(n >= o, "{:?}", note);
        }
    }
}

#[test]
fn test_verbatim_answers_always_verify() {
    let ctx = fuse(local_chunks(), web_chunks(), 8);
    let verifier = GroundingVerifier::from_settings(&PipelineSettings::default());

    // Every non-empty subset of the fused chunks, copied verbatim.
    let n = ctx.chunks.len();
    for mask in 1u32..(1 << n) {
        let text = ctx
            .chunks
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, c)| c.content())
            .collect::<Vec<_>>()
            .join(" ");
        let answer = Answer {
            text,
            citations: Vec::new(),
            grounded: false,
            attempt: 1,
            degraded: false,
        };
        let report = verifier.check(&answer, &ctx);
        assert!(report.grounded, "mask {:b}: {:?}", mask, report.unsupported);
    }
}

#[tokio::test]
async fn test_returned_quotes_are_substrings_of_their_chunks() {
    let contents: HashMap<String, &str> = PASSAGES
        .iter()
        .chain(WEB_PASSAGES)
        .map(|p| (content_id(p), *p))
        .collect();

    let replies = [
        format!(
            "ANSWER:\nThe limit is ₹10 Crore [{new}].\nCITATIONS:\n- [{new}] \"₹10 Crore, effective April 1 2025\"\n- [{new}] \"₹12 Crore from 2026\"\n- [{old}] \"three times the bank rate\"",
            new = content_id(WEB_PASSAGES[0]),
            old = content_id(PASSAGES[0]),
        ),
        format!(
            "ANSWER:\n{} [{}]\nCITATIONS:\n- [zzzz] “based on self-declaration”",
            PASSAGES[1],
            content_id(PASSAGES[1])
        ),
        "ANSWER:\nNothing to cite here at all, sorry.".to_string(),
    ];

    for reply in replies {
        let llm = Arc::new(ScriptedLlm::routed("HYBRID", vec![Ok(reply.clone()), Ok(reply)]));
        let corpus = Arc::new(MockCorpus::new(
            PASSAGES
                .iter()
                .enumerate()
                .map(|(i, p)| hit(&format!("c{}", i), p, 0.8))
                .collect(),
            vec![],
        ));
        let web = Arc::new(MockWeb::new(vec![web_result(
            WEB_PASSAGES[0],
            "https://news/0",
            Some("Apr 1, 2025"),
        )]));
        let pipeline = pipeline(llm, Some(corpus), Some(web));

        let response = pipeline.ask("What is the MSE loan limit?", None).await;
        for citation in &response.citations {
            let content = contents
                .get(&citation.chunk_id)
                .unwrap_or_else(|| panic!("unknown chunk {}", citation.chunk_id));
            assert!(
                content.contains(&citation.quote),
                "{:?} not in {:?}",
                citation.quote,
                content
            );
        }
    }
}

#[tokio::test]
async fn test_synthesizer_called_at_most_twice_per_request() {
    let synth_calls = Arc::new(AtomicUsize::new(0));
    let counter = synth_calls.clone();
    let llm = Arc::new(ScriptedLlm::with_responder(move |req| {
        if is_classifier(req) {
            return Ok("HYBRID".to_string());
        }
        counter.fetch_add(1, Ordering::SeqCst);
        Ok("ANSWER:\nPartnership firms may deduct a notional surcharge on imported machinery.".to_string())
    }));
    let corpus = Arc::new(MockCorpus::new(
        vec![hit("c0", PASSAGES[0], 0.9), hit("c1", PASSAGES[1], 0.8)],
        vec![],
    ));
    let pipeline = pipeline(llm, Some(corpus), None);

    for i in 0..1000 {
        let before = synth_calls.load(Ordering::SeqCst);
        let response = pipeline.ask(&format!("Question {} about MSE loans?", i), None).await;
        let made = synth_calls.load(Ordering::SeqCst) - before;

        assert!(made <= 2, "request {} made {} synthesizer calls", i, made);
        assert_eq!(response.trace.synthesizer_calls as usize, made);
        assert!(!response.grounded);
        assert!(response.disclaimer.is_some());
    }
    assert_eq!(synth_calls.load(Ordering::SeqCst), 2000);
}
