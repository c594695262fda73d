//! In-memory fakes for the provider seams, used by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::llm::{LlmClient, Message, ModelResponse, ToolSchema};
use crate::retrieval::{normalize, Embedder};
use crate::tools::{SearchHit, SearchProvider, Tool};

const VOCAB: &[&str] = &[
    "manali", "hadimba", "temple", "solang", "valley", "snow", "places", "visit", "goa",
    "beaches", "november", "february", "dubai", "visa",
];

/// Bag-of-words embedder with one dimension per known word plus one for the rest.
#[derive(Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    /// Number of provider round-trips so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; VOCAB.len() + 1];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let slot = VOCAB
                .iter()
                .position(|v| *v == word)
                .unwrap_or(VOCAB.len());
            vector[slot] += 1.0;
        }
        normalize(vector)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }
}

/// Tool returning a fixed output or failing with a fixed reason.
pub struct StaticTool {
    name: &'static str,
    label: &'static str,
    outcome: Result<String, String>,
    queries: Mutex<Vec<String>>,
}

impl StaticTool {
    pub fn ok(name: &'static str, label: &'static str, output: &str) -> Self {
        Self {
            name,
            label,
            outcome: Ok(output.to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &'static str, label: &'static str, reason: &str) -> Self {
        Self {
            name,
            label,
            outcome: Err(reason.to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "test tool"
    }

    fn source_label(&self) -> &str {
        self.label
    }

    async fn execute(&self, query: &str) -> anyhow::Result<String> {
        self.queries.lock().unwrap().push(query.to_string());
        self.outcome.clone().map_err(|reason| anyhow::anyhow!(reason))
    }
}

/// Search provider with canned hits.
pub struct StaticSearch {
    outcome: Option<Vec<SearchHit>>,
}

impl StaticSearch {
    pub fn empty() -> Self {
        Self {
            outcome: Some(Vec::new()),
        }
    }

    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            outcome: Some(hits),
        }
    }

    pub fn failing() -> Self {
        Self { outcome: None }
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(
        &self,
        _query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ProviderError> {
        match &self.outcome {
            Some(hits) => Ok(hits.iter().take(max_results).cloned().collect()),
            None => Err(ProviderError::Network {
                provider: "web_search",
                message: "connection refused".to_string(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Model that replays a script of responses and records what it was shown.
#[derive(Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlm {
    pub fn new(script: Vec<Result<ModelResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Conversations passed to each completion call, in order.
    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        _system_prompt: &str,
        messages: &[Message],
        _tools: &[ToolSchema],
    ) -> Result<ModelResponse, ProviderError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::malformed("llm", "script exhausted")))
    }
}

/// Model that waits, then answers `echo <last user message>`.
pub struct EchoLlm {
    delay: Duration,
}

impl EchoLlm {
    pub fn slow(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl LlmClient for EchoLlm {
    async fn complete(
        &self,
        _system_prompt: &str,
        messages: &[Message],
        _tools: &[ToolSchema],
    ) -> Result<ModelResponse, ProviderError> {
        tokio::time::sleep(self.delay).await;
        let question = messages
            .iter()
            .rev()
            .find_map(|m| match m {
                Message::User { content } => Some(content.as_str()),
                _ => None,
            })
            .unwrap_or_default();
        Ok(ModelResponse::text(format!("echo {question}")))
    }
}
