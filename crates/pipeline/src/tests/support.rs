//! In-memory collaborators for pipeline tests.

use crate::generator::Generator;
use crate::orchestrator::Pipeline;
use comply_core::{AppError, AppResult, PipelineSettings};
use comply_knowledge::{CorpusHit, CorpusIndex, WebResult, WebSearchProvider};
use comply_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use comply_prompt::PromptSet;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn hit(id: &str, content: &str, score: f32) -> CorpusHit {
    CorpusHit {
        chunk_id: id.to_string(),
        content: content.to_string(),
        source_id: format!("corpus/{}.pdf", id),
        score,
        published_year: None,
    }
}

pub fn web_result(snippet: &str, url: &str, date: Option<&str>) -> WebResult {
    WebResult {
        title: "result".to_string(),
        snippet: snippet.to_string(),
        url: url.to_string(),
        published_date: date.map(str::to_string),
    }
}

#[derive(Default)]
pub struct MockCorpus {
    semantic: Vec<CorpusHit>,
    lexical: Vec<CorpusHit>,
    fail_semantic: bool,
    fail_lexical: bool,
    hang: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockCorpus {
    pub fn new(semantic: Vec<CorpusHit>, lexical: Vec<CorpusHit>) -> Self {
        Self {
            semantic,
            lexical,
            ..Default::default()
        }
    }

    pub fn failing_semantic(mut self) -> Self {
        self.fail_semantic = true;
        self
    }

    pub fn failing_lexical(mut self) -> Self {
        self.fail_lexical = true;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Answer every search after `delay`.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self, hits: &[CorpusHit], fail: bool, k: usize) -> AppResult<Vec<CorpusHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(AppError::Corpus("index offline".to_string()));
        }
        Ok(hits.iter().take(k).cloned().collect())
    }
}

#[async_trait::async_trait]
impl CorpusIndex for MockCorpus {
    async fn search_semantic(&self, _query: &str, k: usize) -> AppResult<Vec<CorpusHit>> {
        self.answer(&self.semantic, self.fail_semantic, k).await
    }

    async fn search_lexical(&self, _query: &str, k: usize) -> AppResult<Vec<CorpusHit>> {
        self.answer(&self.lexical, self.fail_lexical, k).await
    }
}

#[derive(Default)]
pub struct MockWeb {
    results: Vec<WebResult>,
    fail: bool,
    hang: bool,
    queries: Mutex<Vec<String>>,
}

impl MockWeb {
    pub fn new(results: Vec<WebResult>) -> Self {
        Self {
            results,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.queries().len()
    }
}

#[async_trait::async_trait]
impl WebSearchProvider for MockWeb {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &str, k: usize) -> AppResult<Vec<WebResult>> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(AppError::WebSearch("search quota exceeded".to_string()));
        }
        Ok(self.results.iter().take(k).cloned().collect())
    }
}

type Responder = Box<dyn Fn(&LlmRequest) -> AppResult<String> + Send + Sync>;

/// A text generation provider that replays a script or a responder.
pub struct ScriptedLlm {
    script: Mutex<VecDeque<AppResult<String>>>,
    responder: Option<Responder>,
    hang: bool,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    /// Replies in order; errors once the script runs out.
    pub fn new(script: Vec<AppResult<String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            responder: None,
            hang: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::failing()
        }
    }

    pub fn with_responder(
        responder: impl Fn(&LlmRequest) -> AppResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::failing()
        }
    }

    /// Classifies every question as `intent` and answers synthesis prompts
    /// from `answers` in order (errors once they run out).
    pub fn routed(intent: &str, answers: Vec<AppResult<String>>) -> Self {
        let intent = intent.to_string();
        let answers = Mutex::new(VecDeque::from(answers));
        Self::with_responder(move |req| {
            if is_classifier(req) {
                return Ok(intent.clone());
            }
            answers
                .lock()
                .ok()
                .and_then(|mut a| a.pop_front())
                .unwrap_or_else(|| Err(AppError::Llm("script exhausted".to_string())))
        })
    }

    pub fn calls(&self) -> usize {
        self.requests().len()
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn synthesis_requests(&self) -> Vec<LlmRequest> {
        self.requests()
            .into_iter()
            .filter(|r| is_synthesis(r))
            .collect()
    }
}

pub fn is_classifier(req: &LlmRequest) -> bool {
    req.prompt.contains("Category:")
}

pub fn is_synthesis(req: &LlmRequest) -> bool {
    req.prompt.contains("Evidence:")
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if self.hang {
            std::future::pending::<()>().await;
        }

        let content = match &self.responder {
            Some(responder) => responder(request),
            None => self
                .script
                .lock()
                .ok()
                .and_then(|mut s| s.pop_front())
                .unwrap_or_else(|| Err(AppError::Llm("provider unreachable".to_string()))),
        }?;

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

pub fn generator(llm: Arc<ScriptedLlm>) -> Generator {
    Generator::new(llm, "test-model", &PipelineSettings::default())
}

pub fn pipeline(
    llm: Arc<ScriptedLlm>,
    corpus: Option<Arc<MockCorpus>>,
    web: Option<Arc<MockWeb>>,
) -> Pipeline {
    let corpus = corpus.map(|c| c as Arc<dyn CorpusIndex>);
    let web = web.map(|w| w as Arc<dyn WebSearchProvider>);
    Pipeline::new(
        llm,
        "test-model",
        corpus,
        web,
        &PromptSet::default(),
        PipelineSettings::default(),
    )
    .unwrap()
}
