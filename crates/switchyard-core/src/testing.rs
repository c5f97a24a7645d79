//! In-crate mock backends and embedders for unit tests.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::Stream;

use switchyard_types::error::EmbeddingError;
use switchyard_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason,
    StreamEvent, Usage,
};
use switchyard_types::tool::ToolCall;

use crate::cache::box_embedder::BoxEmbedder;
use crate::cache::embedder::Embedder;
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::provider::LlmProvider;

pub(crate) const MOCK_USAGE: Usage = Usage {
    input_tokens: 10,
    output_tokens: 20,
};

#[derive(Clone)]
enum Behavior {
    Reply(String),
    Fail(LlmError),
}

/// Scriptable backend.
///
/// Replies (or fails) the same way on every call unless a script is set,
/// in which case scripted results are consumed first.
pub(crate) struct MockProvider {
    name: String,
    capabilities: ProviderCapabilities,
    behavior: Behavior,
    script: Arc<Mutex<VecDeque<Result<String, LlmError>>>>,
    calls: Arc<AtomicU32>,
    delay: Option<Duration>,
    healthy: bool,
    fail_mid_stream: bool,
    tool_calls: Vec<ToolCall>,
    last_request: Arc<Mutex<Option<CompletionRequest>>>,
}

impl MockProvider {
    pub fn ok(name: &str) -> Self {
        Self::replying(name, &format!("Hello from {name}"))
    }

    pub fn replying(name: &str, content: &str) -> Self {
        Self::with_behavior(name, Behavior::Reply(content.to_string()))
    }

    pub fn failing(name: &str, error: LlmError) -> Self {
        Self::with_behavior(name, Behavior::Fail(error))
    }

    fn with_behavior(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            capabilities: ProviderCapabilities::default(),
            behavior,
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicU32::new(0)),
            delay: None,
            healthy: true,
            fail_mid_stream: false,
            tool_calls: Vec::new(),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_script(self, script: Vec<Result<String, LlmError>>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn failing_mid_stream(mut self) -> Self {
        self.fail_mid_stream = true;
        self
    }

    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }

    pub fn last_request(&self) -> Arc<Mutex<Option<CompletionRequest>>> {
        Arc::clone(&self.last_request)
    }

    pub fn boxed(self) -> BoxLlmProvider {
        BoxLlmProvider::new(self)
    }

    fn next_result(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if let Some(scripted) = self.script.lock().unwrap().pop_front() {
            return scripted;
        }
        match &self.behavior {
            Behavior::Reply(content) => Ok(content.clone()),
            Behavior::Fail(err) => Err(err.clone()),
        }
    }

    fn model_for(&self, request: &CompletionRequest) -> String {
        if request.model.is_empty() {
            format!("{}-model", self.name)
        } else {
            request.model.clone()
        }
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let result = self.next_result(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let content = result?;
        Ok(CompletionResponse {
            id: format!("resp-{}", self.name),
            content,
            model: self.model_for(request),
            stop_reason: if self.tool_calls.is_empty() {
                StopReason::EndTurn
            } else {
                StopReason::ToolUse
            },
            usage: MOCK_USAGE,
            tool_calls: self.tool_calls.clone(),
        })
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        let result = self.next_result(&request);
        let delay = self.delay;
        let fail_mid_stream = self.fail_mid_stream;

        Box::pin(async_stream::stream! {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match result {
                Err(err) => yield Err(err),
                Ok(content) => {
                    yield Ok(StreamEvent::Connected);
                    for (i, word) in content.split_inclusive(' ').enumerate() {
                        yield Ok(StreamEvent::TextDelta { text: word.to_string() });
                        if fail_mid_stream && i == 0 {
                            yield Err(LlmError::Stream("connection reset".to_string()));
                            return;
                        }
                    }
                    yield Ok(StreamEvent::Usage(MOCK_USAGE));
                    yield Ok(StreamEvent::MessageDelta { stop_reason: StopReason::EndTurn });
                    yield Ok(StreamEvent::Done);
                }
            }
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }
}

/// Deterministic embedder.
///
/// Texts registered with [`MockEmbedder::insert`] map to their fixed vector;
/// anything else gets a letter-frequency vector folded into `dimension`
/// buckets.
pub(crate) struct MockEmbedder {
    dimension: usize,
    fixed: HashMap<String, Vec<f32>>,
    fail: bool,
    calls: Arc<AtomicU32>,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fixed: HashMap::new(),
            fail: false,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(4)
        }
    }

    pub fn insert(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }

    pub fn boxed(self) -> BoxEmbedder {
        BoxEmbedder::new(self)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.fixed.get(text) {
            return v.clone();
        }
        let mut v = vec![0.0; self.dimension];
        for c in text.chars().filter(|c| c.is_alphanumeric()) {
            v[(c as usize) % self.dimension] += 1.0;
        }
        v
    }
}

impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbeddingError::Failed("mock embedder failure".to_string()));
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Unit vector along `axis`.
pub(crate) fn axis(dimension: usize, axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; dimension];
    v[axis] = 1.0;
    v
}
