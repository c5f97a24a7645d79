//! Offline last-resort backend.
//!
//! Answers every request with a fixed notice and zero usage, so a chain that
//! ends in a local backend never fails outright when every remote is down.

use futures_util::stream;

use switchyard_core::llm::dispatch::EventStream;
use switchyard_core::llm::provider::LlmProvider;
use switchyard_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason,
    StreamEvent, Usage,
};

pub const DEFAULT_NOTICE: &str =
    "All remote providers are currently unavailable. Please try again shortly.";

pub struct LocalProvider {
    name: String,
    model: String,
    notice: String,
    capabilities: ProviderCapabilities,
}

impl LocalProvider {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            notice: DEFAULT_NOTICE.to_string(),
            capabilities: ProviderCapabilities {
                streaming: true,
                cacheable: false,
                tool_calling: false,
                max_context_tokens: u32::MAX,
                max_output_tokens: u32::MAX,
            },
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = notice.into();
        self
    }
}

impl LlmProvider for LocalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse {
            id: format!("local-{}", uuid::Uuid::now_v7()),
            content: self.notice.clone(),
            model: self.model.clone(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
            tool_calls: Vec::new(),
        })
    }

    fn stream(&self, _request: CompletionRequest) -> EventStream {
        let events = vec![
            Ok(StreamEvent::Connected),
            Ok(StreamEvent::TextDelta {
                text: self.notice.clone(),
            }),
            Ok(StreamEvent::MessageDelta {
                stop_reason: StopReason::EndTurn,
            }),
            Ok(StreamEvent::Done),
        ];
        Box::pin(stream::iter(events))
    }
}
