//! Configuration management for the compliance assistant.
//!
//! Configuration is merged from several sources, later ones winning:
//! - Built-in defaults
//! - Config file (`.comply/config.yaml` or `COMPLY_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The answering pipeline only ever reads this configuration; nothing in it
//! is mutated once a request is running.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["ollama", "openai", "groq"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .comply/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Text generation provider ("ollama", "openai", "groq")
    pub provider: String,

    /// Model identifier for the active provider
    pub model: String,

    /// API key override for the text generation provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Provider table from config.yaml
    pub llm: Option<LlmConfig>,

    /// Local corpus index settings
    pub corpus: CorpusSettings,

    /// Web search settings
    pub web: WebSettings,

    /// Answering pipeline tunables
    pub pipeline: PipelineSettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    /// Hosted OpenAI-compatible API (OpenAI, Groq)
    Hosted {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    /// Local Ollama runtime
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::Hosted { model, .. } | ProviderConfig::Ollama { model, .. } => model,
        }
    }

    /// Endpoint override, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::Hosted { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Where the pre-built corpus index lives and how queries are embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorpusSettings {
    /// SQLite index path; defaults to `.comply/corpus/index.sqlite`
    pub index_path: Option<PathBuf>,

    /// Query embedder ("trigram" or "ollama"); must match the ingestion job
    pub embedder: String,

    /// Embedding model (ollama embedder only)
    pub embedding_model: String,

    /// Embedding dimensions
    pub dimensions: usize,

    /// Ollama endpoint for the ollama embedder
    pub endpoint: Option<String>,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            index_path: None,
            embedder: "trigram".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            dimensions: 384,
            endpoint: None,
        }
    }
}

/// Web search provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebSettings {
    /// Disable to answer from the corpus only
    pub enabled: bool,

    /// Provider name (only "serper" is built in)
    pub provider: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Endpoint override
    pub endpoint: Option<String>,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "serper".to_string(),
            api_key_env: "SERPER_API_KEY".to_string(),
            endpoint: None,
        }
    }
}

/// Tunables for one pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Chunks requested from each corpus ranking
    pub local_k: usize,

    /// Snippets requested from web search
    pub web_k: usize,

    /// Maximum chunks handed to the synthesizer
    pub evidence_window: usize,

    /// Deadline for each corpus/web call
    pub retrieval_timeout_secs: u64,

    /// Deadline for each text generation call
    pub generation_timeout_secs: u64,

    /// Fraction of a sentence's content terms that must appear in evidence
    pub grounding_threshold: f32,

    /// Sentences with fewer content terms are not checked
    pub min_sentence_tokens: usize,

    /// Appended to web queries; `{year}` becomes the current year
    pub recency_qualifier: String,

    /// Local evidence older than this many years is reported stale
    pub stale_after_years: i32,

    /// Sampling temperature for generation
    pub temperature: f32,

    /// Completion length limit
    pub max_tokens: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            local_k: 5,
            web_k: 3,
            evidence_window: 8,
            retrieval_timeout_secs: 10,
            generation_timeout_secs: 60,
            grounding_threshold: 0.6,
            min_sentence_tokens: 4,
            recency_qualifier: "latest amendment {year} notification".to_string(),
            stale_after_years: 2,
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    corpus: Option<CorpusSettings>,
    web: Option<WebSettings>,
    pipeline: Option<PipelineSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            llm: None,
            corpus: CorpusSettings::default(),
            web: WebSettings::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and environment.
    ///
    /// Environment variables:
    /// - `COMPLY_WORKSPACE`: Override workspace path
    /// - `COMPLY_CONFIG`: Path to config file
    /// - `COMPLY_PROVIDER`: Text generation provider
    /// - `COMPLY_MODEL`: Model identifier
    /// - `COMPLY_API_KEY`: API key for the provider
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use comply_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("COMPLY_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("COMPLY_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.comply_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("COMPLY_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("COMPLY_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("COMPLY_API_KEY").ok();
        config.log_level = std::env::var("RUST_LOG").ok().or(config.log_level);

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(self.clone().apply_file(config_file))
    }

    fn apply_file(mut self, file: ConfigFile) -> Self {
        if let Some(path) = file.workspace.and_then(|ws| ws.path) {
            self.workspace = PathBuf::from(path);
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
            if let Some(json) = logging.json {
                self.log_json = json;
            }
        }

        if let Some(llm) = file.llm {
            self.provider = llm.active_provider.clone();
            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                self.model = provider_config.model().to_string();
            }
            self.llm = Some(llm);
        }

        if let Some(corpus) = file.corpus {
            self.corpus = corpus;
        }
        if let Some(web) = file.web {
            self.web = web;
        }
        if let Some(pipeline) = file.pipeline {
            self.pipeline = pipeline;
        }

        self
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .comply directory.
    pub fn comply_dir(&self) -> PathBuf {
        self.workspace.join(".comply")
    }

    /// Ensure the .comply directory exists.
    pub fn ensure_comply_dir(&self) -> AppResult<()> {
        let dir = self.comply_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .comply directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Location of the corpus index.
    pub fn corpus_index_path(&self) -> PathBuf {
        match self.corpus.index_path {
            Some(ref path) if path.is_absolute() => path.clone(),
            Some(ref path) => self.workspace.join(path),
            None => self.comply_dir().join("corpus").join("index.sqlite"),
        }
    }

    /// Get the configuration entry for a provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint override for the active provider.
    pub fn resolve_endpoint(&self) -> Option<String> {
        self.get_provider_config(&self.provider)
            .and_then(|pc| pc.endpoint())
            .map(str::to_string)
    }

    /// Resolve the API key for a provider.
    ///
    /// `COMPLY_API_KEY` wins; otherwise the provider's `apiKeyEnv` is read,
    /// falling back to the conventional `<PROVIDER>_API_KEY` variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        let env_var = match self.get_provider_config(provider) {
            Some(ProviderConfig::Hosted { api_key_env, .. }) => api_key_env.clone(),
            Some(ProviderConfig::Ollama { .. }) => return None,
            None => format!("{}_API_KEY", provider.to_uppercase()),
        };

        std::env::var(env_var).ok()
    }

    /// Resolve the web search API key, if web search is enabled.
    pub fn resolve_web_api_key(&self) -> Option<String> {
        if !self.web.enabled {
            return None;
        }
        std::env::var(&self.web.api_key_env).ok()
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider != "ollama" && self.resolve_api_key(provider).is_none() {
            return Err(AppError::Config(format!(
                "No API key found for provider '{}'. Set COMPLY_API_KEY or {}_API_KEY",
                provider,
                provider.to_uppercase()
            )));
        }

        if !(0.0..=1.0).contains(&self.pipeline.grounding_threshold) {
            return Err(AppError::Config(format!(
                "pipeline.groundingThreshold must be within [0, 1], got {}",
                self.pipeline.grounding_threshold
            )));
        }

        if self.pipeline.evidence_window == 0 {
            return Err(AppError::Config(
                "pipeline.evidenceWindow must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
