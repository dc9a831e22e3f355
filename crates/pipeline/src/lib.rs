//! Hybrid retrieval, recency fusion and grounding verification for
//! compliance questions.
//!
//! [`Pipeline::ask`] runs one question through intent classification,
//! concurrent local and web retrieval, fusion, synthesis and verification,
//! with at most one corrective retry.

mod control;
pub mod evidence;
pub mod fusion;
mod generator;
pub mod intent;
pub mod orchestrator;
pub mod profile;
pub mod response;
pub mod retriever;
pub mod synthesizer;
pub mod verifier;

#[cfg(test)]
mod tests;

pub use evidence::{EvidenceChunk, SourceType};
pub use fusion::{fuse, ConflictNote, FreshnessReport, FusedContext, Resolution};
pub use intent::Intent;
pub use orchestrator::{Inspection, Pipeline, PipelineState};
pub use profile::ProfileContext;
pub use response::{AskResponse, CitationRef, PipelineTrace};
pub use retriever::SourceStatus;
pub use synthesizer::{Answer, Citation};
pub use verifier::{GroundingVerifier, VerificationReport};
