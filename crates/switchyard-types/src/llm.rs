//! LLM request/response types for Switchyard.
//!
//! These types model the data shapes for backend interactions:
//! completion requests, streaming events, usage tracking, and error handling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::tool::{ToolCall, ToolDefinition};

/// Role of a message in an LLM conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message in an LLM conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Caller-supplied generation parameters.
///
/// Every field is optional; unset fields fall back to the dispatch defaults
/// from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// Request to a backend for a completion.
///
/// An empty `model` means "use the backend's configured default".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl CompletionRequest {
    /// Copy of this request with the model replaced, used when a backend
    /// carries its own default model and the caller did not pick one.
    pub fn with_model(&self, model: &str) -> Self {
        let mut request = self.clone();
        request.model = model.to_string();
        request
    }
}

/// Response from a backend for a non-streaming completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    pub content: String,
    pub model: String,
    pub stop_reason: StopReason,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// Reason why the backend stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndTurn => write!(f, "end_turn"),
            StopReason::ToolUse => write!(f, "tool_use"),
            StopReason::MaxTokens => write!(f, "max_tokens"),
            StopReason::StopSequence => write!(f, "stop_sequence"),
        }
    }
}

impl FromStr for StopReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "end_turn" | "stop" => Ok(StopReason::EndTurn),
            "tool_use" | "tool_calls" => Ok(StopReason::ToolUse),
            "max_tokens" | "length" => Ok(StopReason::MaxTokens),
            "stop_sequence" => Ok(StopReason::StopSequence),
            other => Err(format!("invalid stop reason: '{other}'")),
        }
    }
}

/// Token usage for a completion request/response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u64 {
        u64::from(self.input_tokens) + u64::from(self.output_tokens)
    }

    /// Component-wise sum, used when a request also paid for a summarization call.
    pub fn merge(&self, other: &Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
        }
    }
}

/// Events emitted during a streaming backend response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Connection established with the backend.
    Connected,

    /// A fragment of text content.
    TextDelta { text: String },

    /// A tool call has been fully received.
    ToolUseComplete(ToolCall),

    /// The message is finishing with a stop reason.
    MessageDelta { stop_reason: StopReason },

    /// Token usage information.
    Usage(Usage),

    /// The stream has completed.
    Done,
}

/// Errors from a single backend attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("provider overloaded: {0}")]
    Overloaded(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("context length exceeded: max {max}, requested {requested}")]
    ContextLengthExceeded { max: u32, requested: u32 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Capabilities of a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub streaming: bool,
    /// Responses may be stored in the semantic cache. Off for fallback
    /// responders whose answers stop being valid once real backends recover.
    pub cacheable: bool,
    pub tool_calling: bool,
    pub max_context_tokens: u32,
    pub max_output_tokens: u32,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            streaming: true,
            cacheable: true,
            tool_calling: false,
            max_context_tokens: 32_000,
            max_output_tokens: 4_096,
        }
    }
}

/// Backend family. One concrete adapter per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
    Anthropic,
    Local,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::OpenAiCompatible => write!(f, "openai_compatible"),
            ProviderType::Anthropic => write!(f, "anthropic"),
            ProviderType::Local => write!(f, "local"),
        }
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai_compatible" | "openai" => Ok(ProviderType::OpenAiCompatible),
            "anthropic" => Ok(ProviderType::Anthropic),
            "local" => Ok(ProviderType::Local),
            other => Err(format!("invalid provider type: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_roundtrip() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            let s = role.to_string();
            let parsed: MessageRole = s.parse().unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn test_stop_reason_accepts_openai_spelling() {
        assert_eq!("stop".parse::<StopReason>().unwrap(), StopReason::EndTurn);
        assert_eq!("length".parse::<StopReason>().unwrap(), StopReason::MaxTokens);
        assert_eq!(
            "tool_calls".parse::<StopReason>().unwrap(),
            StopReason::ToolUse
        );
        assert!("bogus".parse::<StopReason>().is_err());
    }

    #[test]
    fn test_usage_total_and_merge() {
        let a = Usage {
            input_tokens: 10,
            output_tokens: 20,
        };
        let b = Usage {
            input_tokens: 1,
            output_tokens: 2,
        };
        assert_eq!(a.total(), 30);
        let merged = a.merge(&b);
        assert_eq!(merged.input_tokens, 11);
        assert_eq!(merged.output_tokens, 22);
    }

    #[test]
    fn test_provider_type_serde() {
        let pt = ProviderType::OpenAiCompatible;
        let json = serde_json::to_string(&pt).unwrap();
        assert_eq!(json, "\"openai_compatible\"");
        let parsed: ProviderType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ProviderType::OpenAiCompatible);
        assert_eq!("openai".parse::<ProviderType>().unwrap(), pt);
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::Timeout { timeout_ms: 1500 };
        assert_eq!(err.to_string(), "request timed out after 1500ms");
    }

    #[test]
    fn test_with_model_replaces_only_model() {
        let request = CompletionRequest {
            model: String::new(),
            messages: vec![Message::user("hi")],
            system: None,
            max_tokens: 10,
            temperature: None,
            stream: false,
            stop_sequences: None,
            tools: Vec::new(),
        };
        let routed = request.with_model("deepseek-chat");
        assert_eq!(routed.model, "deepseek-chat");
        assert_eq!(routed.messages, request.messages);
    }
}
