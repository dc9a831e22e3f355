//! Prompt builder for rendering the pipeline's templates.

use crate::loader::validate_prompt_set;
use crate::types::{BuiltPrompt, PromptSet, CHITCHAT_ID, CLASSIFIER_ID, SYNTHESIS_ID};
use comply_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Variables for one synthesis prompt. Pre-rendered text blocks; empty
/// strings drop the matching section from the template.
#[derive(Debug, Clone, Default)]
pub struct SynthesisVars {
    pub question: String,
    pub profile: String,
    pub evidence: String,
    pub conflicts: String,
    pub freshness: String,
    pub unsupported: String,
}

/// Renders prompts from a validated [`PromptSet`].
///
/// Templates are compiled once at construction, so a bad override fails at
/// startup instead of mid-request.
pub struct PromptBuilder {
    handlebars: Handlebars<'static>,
}

impl PromptBuilder {
    pub fn new(set: &PromptSet) -> AppResult<Self> {
        validate_prompt_set(set)?;

        let mut handlebars = Handlebars::new();

        // Disable HTML escaping for plain text
        handlebars.register_escape_fn(handlebars::no_escape);

        for (name, template) in set.templates() {
            handlebars
                .register_template_string(name, template)
                .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;
        }

        Ok(Self { handlebars })
    }

    /// Intent classification prompt.
    pub fn classifier(&self, question: &str, profile: &str) -> AppResult<BuiltPrompt> {
        let variables = HashMap::from([
            ("question".to_string(), question.to_string()),
            ("profile".to_string(), profile.to_string()),
        ]);
        self.build(CLASSIFIER_ID, "classifierSystem", "classifier", variables)
    }

    /// Grounded answer prompt, including the corrective section on retries.
    pub fn synthesis(&self, vars: SynthesisVars) -> AppResult<BuiltPrompt> {
        let variables = HashMap::from([
            ("question".to_string(), vars.question),
            ("profile".to_string(), vars.profile),
            ("evidence".to_string(), vars.evidence),
            ("conflicts".to_string(), vars.conflicts),
            ("freshness".to_string(), vars.freshness),
            ("unsupported".to_string(), vars.unsupported),
        ]);
        self.build(SYNTHESIS_ID, "synthesisSystem", "synthesis", variables)
    }

    /// Small-talk prompt for GENERAL questions.
    pub fn chitchat(&self, question: &str, profile: &str) -> AppResult<BuiltPrompt> {
        let variables = HashMap::from([
            ("question".to_string(), question.to_string()),
            ("profile".to_string(), profile.to_string()),
        ]);
        self.build(CHITCHAT_ID, "chitchatSystem", "chitchat", variables)
    }

    fn build(
        &self,
        id: &str,
        system_template: &str,
        user_template: &str,
        variables: HashMap<String, String>,
    ) -> AppResult<BuiltPrompt> {
        tracing::debug!("Building prompt: {}", id);

        let system = self.render(system_template, &variables)?;
        let user = self.render(user_template, &variables)?;

        Ok(BuiltPrompt::new(Some(system), user, id, variables))
    }

    fn render(&self, name: &str, variables: &HashMap<String, String>) -> AppResult<String> {
        self.handlebars
            .render(name, variables)
            .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PromptBuilder {
        PromptBuilder::new(&PromptSet::default()).unwrap()
    }

    #[test]
    fn test_classifier_renders_question_and_profile() {
        let built = builder()
            .classifier("What is the GST rate on <restaurants>?", "State: Delhi")
            .unwrap();
        assert!(built.user.contains("What is the GST rate on <restaurants>?"));
        assert!(built.user.contains("State: Delhi"));
        assert_eq!(built.metadata.source_prompt_id, CLASSIFIER_ID);
    }

    #[test]
    fn test_synthesis_omits_empty_sections() {
        let built = builder()
            .synthesis(SynthesisVars {
                question: "q".to_string(),
                evidence: "[abc] text".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(built.user.contains("[abc] text"));
        assert!(!built.user.contains("Conflicts between sources"));
        assert!(!built.user.contains("previous answer"));
    }

    #[test]
    fn test_synthesis_corrective_section() {
        let built = builder()
            .synthesis(SynthesisVars {
                question: "q".to_string(),
                evidence: "[abc] text".to_string(),
                conflicts: "- newer wins".to_string(),
                unsupported: "- \"The limit is unlimited.\"".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(built.user.contains("Conflicts between sources"));
        assert!(built.user.contains("The limit is unlimited."));
        assert!(built.system.unwrap().contains("ONLY"));
    }

    #[test]
    fn test_bad_template_fails_at_construction() {
        let set = PromptSet {
            chitchat: "{{#each}}".to_string(),
            ..Default::default()
        };
        assert!(PromptBuilder::new(&set).is_err());
    }
}
