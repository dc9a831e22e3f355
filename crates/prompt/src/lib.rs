//! Prompt templates for the compliance assistant.
//!
//! This crate provides:
//! - One `PromptSet` holding every template the pipeline renders
//! - YAML overrides loaded from `.comply/prompts.yaml`
//! - Handlebars rendering into `BuiltPrompt`s

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{PromptBuilder, SynthesisVars};
pub use loader::load_prompt_set;
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptSet};
