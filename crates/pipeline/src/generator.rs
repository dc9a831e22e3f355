//! Rendered prompt → text generation provider → text, under a deadline.

use crate::control::with_timeout;
use comply_core::{AppError, AppResult, PipelineSettings};
use comply_llm::{LlmClient, LlmRequest};
use comply_prompt::BuiltPrompt;
use std::sync::Arc;
use std::time::Duration;

/// The configured provider plus the request defaults every stage shares.
#[derive(Clone)]
pub struct Generator {
    llm: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl Generator {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, settings: &PipelineSettings) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout: Duration::from_secs(settings.generation_timeout_secs),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.llm.provider_name()
    }

    /// Send `prompt`, capping the reply at `max_tokens` when given.
    pub async fn complete(
        &self,
        prompt: BuiltPrompt,
        operation: &str,
        max_tokens: Option<u32>,
    ) -> AppResult<String> {
        let mut request = LlmRequest::new(prompt.user, self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(max_tokens.unwrap_or(self.max_tokens));
        if let Some(system) = prompt.system {
            request = request.with_system(system);
        }

        let response = with_timeout(self.timeout, operation, self.llm.complete(&request)).await?;
        let content = response.content.trim().to_string();
        if content.is_empty() {
            return Err(AppError::Llm(format!("Empty response for {}", operation)));
        }
        Ok(content)
    }
}
