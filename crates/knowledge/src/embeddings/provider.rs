//! Embedding provider trait and factory.

use comply_core::config::CorpusSettings;
use comply_core::{AppError, AppResult};
use std::sync::Arc;

use super::providers::{OllamaProvider, TrigramProvider};

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Corpus("No embedding returned".to_string()))
    }
}

/// Create the query embedder named in the corpus settings.
pub fn create_provider(settings: &CorpusSettings) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match settings.embedder.as_str() {
        "trigram" => Ok(Arc::new(TrigramProvider::new(settings.dimensions))),

        "ollama" => {
            let provider = OllamaProvider::new(
                settings.endpoint.as_deref(),
                &settings.embedding_model,
                settings.dimensions,
            )?;
            Ok(Arc::new(provider))
        }

        other => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trigram_provider() {
        let settings = CorpusSettings::default();

        let provider = create_provider(&settings).unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_ollama_provider_is_lazy() {
        let settings = CorpusSettings {
            embedder: "ollama".to_string(),
            dimensions: 768,
            ..Default::default()
        };

        let provider = create_provider(&settings).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
    }

    #[test]
    fn test_create_unknown_provider() {
        let settings = CorpusSettings {
            embedder: "unknown".to_string(),
            ..Default::default()
        };

        let result = create_provider(&settings);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let provider = create_provider(&CorpusSettings::default()).unwrap();

        let embedding = provider.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
