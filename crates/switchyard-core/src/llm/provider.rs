//! LlmProvider trait definition.
//!
//! This is the capability every backend adapter implements.
//! Uses RPITIT for `complete` and `health_check`, and `Pin<Box<dyn Stream>>`
//! for `stream` (streams need to be object-safe for the BoxLlmProvider wrapper).

use std::pin::Pin;

use futures_util::Stream;

use switchyard_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StreamEvent,
};

/// Trait for backend adapters (OpenAI-compatible, Anthropic, local).
///
/// Implementations live in switchyard-infra. Wire marshaling stays inside
/// the adapter; the dispatcher only sees normalized requests and responses.
pub trait LlmProvider: Send + Sync {
    /// Registry identifier (e.g., "deepseek", "openai").
    fn name(&self) -> &str;

    /// What this backend supports (streaming, tool calling, etc.).
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Send a streaming completion request. Returns a stream of events.
    ///
    /// Returns a boxed stream (not RPITIT) because streams need to be
    /// object-safe for the `BoxLlmProvider` wrapper.
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

    /// Cheap liveness probe consulted before each dispatch attempt.
    ///
    /// Adapters without a meaningful probe report healthy.
    fn health_check(&self) -> impl std::future::Future<Output = bool> + Send {
        async { true }
    }
}
