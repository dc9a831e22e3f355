//! Prompt types for the compliance assistant.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CLASSIFIER_ID: &str = "comply.classify";
pub const SYNTHESIS_ID: &str = "comply.synthesize";
pub const CHITCHAT_ID: &str = "comply.chitchat";

/// Every template the pipeline renders, as one value.
///
/// Built once at startup (defaults merged with `.comply/prompts.yaml`) and
/// handed to the classifier and synthesizer; nothing rewrites it afterwards.
/// Any field missing from the YAML keeps its built-in default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptSet {
    /// System message for intent classification
    pub classifier_system: String,

    /// Classification request; variables: `question`, `profile`
    pub classifier: String,

    /// System message for answer synthesis
    pub synthesis_system: String,

    /// Synthesis request; variables: `question`, `profile`, `evidence`,
    /// `conflicts`, `freshness`, `unsupported`
    pub synthesis: String,

    /// System message for small talk
    pub chitchat_system: String,

    /// Small-talk request; variables: `question`, `profile`
    pub chitchat: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            classifier_system: DEFAULT_CLASSIFIER_SYSTEM.to_string(),
            classifier: DEFAULT_CLASSIFIER.to_string(),
            synthesis_system: DEFAULT_SYNTHESIS_SYSTEM.to_string(),
            synthesis: DEFAULT_SYNTHESIS.to_string(),
            chitchat_system: DEFAULT_CHITCHAT_SYSTEM.to_string(),
            chitchat: DEFAULT_CHITCHAT.to_string(),
        }
    }
}

impl PromptSet {
    /// Template fields paired with their names, for registration and validation.
    pub fn templates(&self) -> [(&'static str, &str); 6] {
        [
            ("classifierSystem", &self.classifier_system),
            ("classifier", &self.classifier),
            ("synthesisSystem", &self.synthesis_system),
            ("synthesis", &self.synthesis),
            ("chitchatSystem", &self.chitchat_system),
            ("chitchat", &self.chitchat),
        ]
    }
}

const DEFAULT_CLASSIFIER_SYSTEM: &str =
    "You route questions for an Indian business compliance assistant. \
Reply with exactly one word: STATIC, DYNAMIC, HYBRID or GENERAL.";

const DEFAULT_CLASSIFIER: &str = r#"User profile: {{profile}}

Classify the query into one category:
STATIC - fixed law: acts, sections, definitions, penalties, procedures.
DYNAMIC - figures that change: rates, limits, thresholds, deadlines, recent notifications or news.
HYBRID - needs both the law and its latest amendments.
GENERAL - greetings, small talk or anything unrelated to compliance.

Query: "{{question}}"

Category:"#;

const DEFAULT_SYNTHESIS_SYSTEM: &str = r#"You are a compliance assistant for Indian businesses.
Rules:
1. Use ONLY the numbered evidence below. Do not use outside knowledge.
2. Every sentence that states a fact must end with the id of its evidence in brackets, e.g. [a1b2c3d4e5f6].
3. Hierarchy of truth: when evidence conflicts, follow the newer source and say explicitly that it supersedes the older one (e.g. "was increased from X to Y, effective ...").
4. Copy figures, dates and section numbers exactly as written in the evidence.
5. If the evidence does not answer the question, say "I do not have enough information to answer this."

Reply in this format:
ANSWER:
<answer text with [id] markers>
CITATIONS:
- [id] "exact sentence copied from that evidence"
"#;

const DEFAULT_SYNTHESIS: &str = r#"User profile: {{profile}}

Evidence:
{{evidence}}
{{#if conflicts}}
Conflicts between sources (follow the newer one and state the change):
{{conflicts}}
{{/if}}
{{#if freshness}}
Freshness: {{freshness}}
{{/if}}
{{#if unsupported}}
Your previous answer contained sentences the evidence does not support:
{{unsupported}}
Remove these sentences or rewrite them using only wording found in the evidence, with citations.
{{/if}}
Question: {{question}}
"#;

const DEFAULT_CHITCHAT_SYSTEM: &str =
    "You are a friendly compliance assistant for Indian businesses. Keep small talk to one or two \
sentences and offer help with registrations, taxes, licences, labour law or government schemes. \
Do not state any legal figures.";

const DEFAULT_CHITCHAT: &str = r#"User profile: {{profile}}

{{question}}"#;

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Which template produced this prompt
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Template variables that were resolved
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: HashMap<String, String>,
}

impl BuiltPrompt {
    /// Create a new built prompt.
    pub fn new(
        system: Option<String>,
        user: String,
        source_prompt_id: impl Into<String>,
        resolved_variables: HashMap<String, String>,
    ) -> Self {
        Self {
            system,
            user,
            metadata: BuiltPromptMetadata {
                source_prompt_id: source_prompt_id.into(),
                resolved_variables,
            },
        }
    }
}
