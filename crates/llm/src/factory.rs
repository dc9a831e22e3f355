//! LLM provider factory.
//!
//! Maps a provider name from configuration onto a concrete client.

use crate::client::LlmClient;
use crate::providers::openai::{GROQ_BASE_URL, OPENAI_BASE_URL};
use crate::providers::{OllamaClient, OpenAiCompatClient};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai", "groq")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key (required for hosted providers)
///
/// # Errors
/// Returns an error if the provider is unknown or a hosted provider has no key.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> Result<Arc<dyn LlmClient>, String> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            Ok(Arc::new(OllamaClient::with_base_url(base_url)))
        }
        "openai" => {
            let key = api_key.ok_or_else(|| "OpenAI provider requires API key".to_string())?;
            let base_url = endpoint.unwrap_or(OPENAI_BASE_URL);
            Ok(Arc::new(OpenAiCompatClient::new("openai", base_url, key)))
        }
        "groq" => {
            let key = api_key.ok_or_else(|| "Groq provider requires API key".to_string())?;
            let base_url = endpoint.unwrap_or(GROQ_BASE_URL);
            Ok(Arc::new(OpenAiCompatClient::new("groq", base_url, key)))
        }
        _ => Err(format!("Unknown provider: {}", provider)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let client = create_client("ollama", Some("http://localhost:8080"), None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_groq_with_key() {
        let client = create_client("Groq", None, Some("gsk-test")).unwrap();
        assert_eq!(client.provider_name(), "groq");
    }

    #[test]
    fn test_openai_requires_api_key() {
        match create_client("openai", None, None) {
            Err(err) => assert!(err.contains("OpenAI provider requires API key")),
            Ok(_) => panic!("Expected error for OpenAI without API key"),
        }
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None) {
            Err(err) => assert!(err.contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
