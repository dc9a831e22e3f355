//! Command handlers for the Comply CLI.

pub mod ask;
pub mod corpus;
pub mod inspect;

pub use ask::AskCommand;
pub use corpus::CorpusCommand;
pub use inspect::InspectCommand;

use comply_core::{config::AppConfig, AppError, AppResult};
use comply_knowledge::{create_provider, CorpusIndex, SerperClient, SqliteCorpus, WebSearchProvider};
use comply_pipeline::{Pipeline, SourceStatus};
use comply_prompt::load_prompt_set;
use std::sync::Arc;

/// Open the corpus index named in the configuration.
pub fn open_corpus(config: &AppConfig) -> AppResult<SqliteCorpus> {
    let embedder = create_provider(&config.corpus)?;
    SqliteCorpus::open(&config.corpus_index_path(), embedder)
}

/// Wire the configured provider, corpus, web search and prompts into a pipeline.
///
/// A missing corpus or web key is not fatal: the pipeline reports that
/// source as unavailable and answers from the other.
pub fn build_pipeline(config: &AppConfig) -> AppResult<Pipeline> {
    config.validate()?;

    let endpoint = config.resolve_endpoint();
    let api_key = config.resolve_api_key(&config.provider);
    let llm = comply_llm::create_client(&config.provider, endpoint.as_deref(), api_key.as_deref())
        .map_err(AppError::Config)?;

    let corpus = match open_corpus(config) {
        Ok(corpus) => Some(Arc::new(corpus) as Arc<dyn CorpusIndex>),
        Err(e) => {
            tracing::warn!("Corpus unavailable: {}", e);
            None
        }
    };

    let web = match config.resolve_web_api_key() {
        Some(key) => {
            let client = SerperClient::new(key, config.web.endpoint.as_deref())?;
            Some(Arc::new(client) as Arc<dyn WebSearchProvider>)
        }
        None => {
            if config.web.enabled {
                tracing::warn!(
                    "Web search disabled: {} is not set",
                    config.web.api_key_env
                );
            }
            None
        }
    };

    let prompts = load_prompt_set(&config.workspace)?;

    Pipeline::new(
        llm,
        config.model.clone(),
        corpus,
        web,
        &prompts,
        config.pipeline.clone(),
    )
}

/// One-line description of how a source behaved.
pub fn describe_status(status: &SourceStatus) -> String {
    match status {
        SourceStatus::Ok { count } => format!("{} chunk(s)", count),
        SourceStatus::Unavailable { reason } => format!("unavailable ({})", reason),
        SourceStatus::Skipped => "skipped".to_string(),
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
