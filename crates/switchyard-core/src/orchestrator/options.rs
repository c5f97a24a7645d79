//! Per-call options and the normalized response.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use switchyard_types::llm::{GenerationParams, Usage};
use switchyard_types::tool::ToolOutcome;

/// Options for [`Orchestrator::chat`](super::Orchestrator::chat).
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Model override. `None` uses each backend's default.
    pub model: Option<String>,
    pub use_conversation: bool,
    pub use_cache: bool,
    pub use_budget: bool,
    /// Advertise registered tools and execute returned tool calls.
    pub use_tools: bool,
    /// Fail the chat when any tool call fails.
    pub require_tool_output: bool,
    /// Attempts per backend.
    pub max_retries: u32,
    pub params: GenerationParams,
    /// Named session. `None` is the default session.
    pub session: Option<String>,
    pub cancel: Option<CancellationToken>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: None,
            use_conversation: true,
            use_cache: true,
            use_budget: true,
            use_tools: false,
            require_tool_output: false,
            max_retries: 3,
            params: GenerationParams::default(),
            session: None,
            cancel: None,
        }
    }
}

/// Options for [`Orchestrator::chat_stream`](super::Orchestrator::chat_stream).
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub model: Option<String>,
    pub use_conversation: bool,
    pub use_cache: bool,
    pub use_budget: bool,
    pub max_retries: u32,
    pub params: GenerationParams,
    pub session: Option<String>,
    pub cancel: Option<CancellationToken>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            model: None,
            use_conversation: true,
            use_cache: true,
            use_budget: true,
            max_retries: 3,
            params: GenerationParams::default(),
            session: None,
            cancel: None,
        }
    }
}

impl From<&ChatOptions> for StreamOptions {
    fn from(options: &ChatOptions) -> Self {
        Self {
            model: options.model.clone(),
            use_conversation: options.use_conversation,
            use_cache: options.use_cache,
            use_budget: options.use_budget,
            max_retries: options.max_retries,
            params: options.params.clone(),
            session: options.session.clone(),
            cancel: options.cancel.clone(),
        }
    }
}

/// Request-shaping flags shared by both entry points.
#[derive(Debug, Clone)]
pub(crate) struct Gating<'a> {
    pub model: Option<&'a str>,
    pub use_conversation: bool,
    pub params: &'a GenerationParams,
}

impl<'a> From<&'a ChatOptions> for Gating<'a> {
    fn from(o: &'a ChatOptions) -> Self {
        Self {
            model: o.model.as_deref(),
            use_conversation: o.use_conversation,
            params: &o.params,
        }
    }
}

impl<'a> From<&'a StreamOptions> for Gating<'a> {
    fn from(o: &'a StreamOptions) -> Self {
        Self {
            model: o.model.as_deref(),
            use_conversation: o.use_conversation,
            params: &o.params,
        }
    }
}

/// Provider name reported for responses served from the semantic cache.
pub const CACHE_PROVIDER: &str = "cache";

/// Normalized chat result.
#[derive(Debug, Clone, Serialize)]
pub struct AIResponse {
    pub content: String,
    pub cached: bool,
    pub provider: String,
    pub model: String,
    pub usage: Usage,
    #[serde(serialize_with = "serialize_ms")]
    pub latency: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failover_warning: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolOutcome>,
}

fn serialize_ms<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
