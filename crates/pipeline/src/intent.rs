//! Intent classification: which evidence sources a question needs.

use crate::generator::Generator;
use crate::profile::{render_profile, ProfileContext};
use comply_prompt::PromptBuilder;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// One word is all the classifier is asked for.
const CLASSIFIER_MAX_TOKENS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    /// Settled law: the local corpus only.
    Static,
    /// Recent changes: web search only.
    Dynamic,
    /// Both sources.
    Hybrid,
    /// Not a compliance question; no retrieval.
    General,
}

impl Intent {
    pub fn wants_local(self) -> bool {
        matches!(self, Intent::Static | Intent::Hybrid)
    }

    pub fn wants_web(self) -> bool {
        matches!(self, Intent::Dynamic | Intent::Hybrid)
    }

    /// First recognised label in a model reply. Accepts the long forms
    /// `STATIC_LAW` and `DYNAMIC_UPDATE` and surrounding chatter.
    pub fn parse(reply: &str) -> Option<Self> {
        reply
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter(|w| !w.is_empty())
            .find_map(|word| {
                let word = word.to_ascii_uppercase();
                match word.as_str() {
                    w if w.starts_with("STATIC") => Some(Intent::Static),
                    w if w.starts_with("DYNAMIC") => Some(Intent::Dynamic),
                    w if w.starts_with("HYBRID") => Some(Intent::Hybrid),
                    w if w.starts_with("GENERAL") => Some(Intent::General),
                    _ => None,
                }
            })
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Intent::Static => "STATIC",
            Intent::Dynamic => "DYNAMIC",
            Intent::Hybrid => "HYBRID",
            Intent::General => "GENERAL",
        };
        f.write_str(label)
    }
}

pub struct IntentClassifier {
    generator: Generator,
    prompts: Arc<PromptBuilder>,
}

impl IntentClassifier {
    pub fn new(generator: Generator, prompts: Arc<PromptBuilder>) -> Self {
        Self { generator, prompts }
    }

    /// Never fails: a provider error, timeout or unreadable reply falls back
    /// to [`Intent::Hybrid`] so that both sources are searched.
    pub async fn classify(&self, question: &str, profile: Option<&ProfileContext>) -> Intent {
        let prompt = match self.prompts.classifier(question, &render_profile(profile)) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(error = %e, "Classifier prompt failed, assuming HYBRID");
                return Intent::Hybrid;
            }
        };

        match self
            .generator
            .complete(prompt, "intent classification", Some(CLASSIFIER_MAX_TOKENS))
            .await
        {
            Ok(reply) => match Intent::parse(&reply) {
                Some(intent) => {
                    tracing::debug!(%intent, "Classified question");
                    intent
                }
                None => {
                    tracing::warn!(reply = %reply, "Unrecognised intent, assuming HYBRID");
                    Intent::Hybrid
                }
            },
            Err(e) => {
                tracing::warn!(
                    provider = self.generator.provider_name(),
                    error = %e,
                    "Intent classification failed, assuming HYBRID"
                );
                Intent::Hybrid
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::{generator, ScriptedLlm};
    use comply_prompt::PromptSet;

    fn classifier(llm: Arc<ScriptedLlm>) -> IntentClassifier {
        let prompts = Arc::new(PromptBuilder::new(&PromptSet::default()).unwrap());
        IntentClassifier::new(generator(llm), prompts)
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!(Intent::parse("STATIC_LAW"), Some(Intent::Static));
        assert_eq!(Intent::parse("dynamic_update"), Some(Intent::Dynamic));
        assert_eq!(Intent::parse("Category: HYBRID."), Some(Intent::Hybrid));
        assert_eq!(Intent::parse("GENERAL"), Some(Intent::General));
        assert_eq!(Intent::parse("I think so"), None);
    }

    #[test]
    fn test_source_selection() {
        assert!(Intent::Static.wants_local() && !Intent::Static.wants_web());
        assert!(!Intent::Dynamic.wants_local() && Intent::Dynamic.wants_web());
        assert!(Intent::Hybrid.wants_local() && Intent::Hybrid.wants_web());
        assert!(!Intent::General.wants_local() && !Intent::General.wants_web());
    }

    #[tokio::test]
    async fn test_classify_uses_reply() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok("DYNAMIC_UPDATE".to_string())]));
        let intent = classifier(llm.clone())
            .classify("Any new GST notification this month?", None)
            .await;
        assert_eq!(intent, Intent::Dynamic);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_defaults_to_hybrid() {
        let llm = Arc::new(ScriptedLlm::failing());
        let intent = classifier(llm).classify("What is Udyam?", None).await;
        assert_eq!(intent, Intent::Hybrid);

        let llm = Arc::new(ScriptedLlm::new(vec![Ok("not sure".to_string())]));
        let intent = classifier(llm).classify("What is Udyam?", None).await;
        assert_eq!(intent, Intent::Hybrid);
    }
}
