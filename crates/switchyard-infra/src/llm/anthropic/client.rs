//! [`AnthropicProvider`]: the Messages API (`/v1/messages`) backend.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and only exposed when
//! building request headers.

use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};

use switchyard_core::llm::dispatch::EventStream;
use switchyard_core::llm::provider::LlmProvider;
use switchyard_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason, Usage,
};
use switchyard_types::tool::ToolCall;

use super::streaming::create_anthropic_stream;
use super::types::{
    AnthropicContentBlock, AnthropicMessage, AnthropicNonStreamResponse, AnthropicRequest,
    AnthropicTool, ErrorPayload,
};
use crate::llm::http::{build_client, map_send_error, map_status};

/// The `anthropic-version` header value.
pub(crate) const API_VERSION: &str = "2023-06-01";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub(crate) fn map_stop_reason(reason: Option<&str>) -> StopReason {
    reason
        .and_then(|r| StopReason::from_str(r).ok())
        .unwrap_or(StopReason::EndTurn)
}

/// Anthropic Claude backend. Not `Debug`.
pub struct AnthropicProvider {
    client: reqwest::Client,
    name: String,
    api_key: SecretString,
    base_url: String,
    model: String,
    capabilities: ProviderCapabilities,
}

impl AnthropicProvider {
    pub fn new(api_key: SecretString, model: String) -> Result<Self, LlmError> {
        let capabilities = Self::capabilities_for_model(&model);
        Ok(Self {
            client: build_client()?,
            name: "anthropic".to_string(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
            capabilities,
        })
    }

    /// The default model for this provider.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Register under a different identifier than "anthropic".
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the base URL (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn capabilities_for_model(model: &str) -> ProviderCapabilities {
        let max_output_tokens = if model.contains("opus") {
            32_000
        } else if model.contains("sonnet") || model.contains("haiku") {
            8_192
        } else {
            4_096
        };
        ProviderCapabilities {
            streaming: true,
            cacheable: true,
            tool_calling: true,
            max_context_tokens: 200_000,
            max_output_tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn to_anthropic_request(&self, request: &CompletionRequest, stream: bool) -> AnthropicRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| AnthropicMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect();

        AnthropicRequest {
            model: if request.model.is_empty() {
                self.model.clone()
            } else {
                request.model.clone()
            },
            max_tokens: request.max_tokens,
            messages,
            system: request.system.clone(),
            stream,
            temperature: request.temperature,
            stop_sequences: request.stop_sequences.clone().filter(|s| !s.is_empty()),
            tools: request
                .tools
                .iter()
                .map(|t| AnthropicTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.parameters.clone(),
                })
                .collect(),
        }
    }
}

fn map_error_body(
    status: reqwest::StatusCode,
    headers: &reqwest::header::HeaderMap,
    text: String,
) -> LlmError {
    match serde_json::from_str::<ErrorPayload>(&text) {
        Ok(payload) if payload.error.error_type == "overloaded_error" => {
            LlmError::Overloaded(payload.error.message)
        }
        Ok(payload) => map_status(status, headers, payload.error.message),
        Err(_) => map_status(status, headers, text),
    }
}

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.to_anthropic_request(request, false);
        tracing::debug!(model = %body.model, "Sending Anthropic message");

        let response = self
            .client
            .post(self.url("/v1/messages"))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(map_error_body(status, &headers, text));
        }

        let resp: AnthropicNonStreamResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in resp.content {
            match block {
                AnthropicContentBlock::Text { text } => content.push_str(&text),
                AnthropicContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id,
                    name,
                    arguments: input,
                }),
                AnthropicContentBlock::Other => {}
            }
        }

        Ok(CompletionResponse {
            id: resp.id,
            content,
            model: resp.model,
            stop_reason: map_stop_reason(resp.stop_reason.as_deref()),
            usage: Usage {
                input_tokens: resp.usage.input_tokens,
                output_tokens: resp.usage.output_tokens,
            },
            tool_calls,
        })
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        let body = self.to_anthropic_request(&request, true);
        create_anthropic_stream(&self.client, &self.url("/v1/messages"), body, &self.api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_types::llm::Message;
    use switchyard_types::tool::ToolDefinition;

    fn make_provider() -> AnthropicProvider {
        AnthropicProvider::new(
            SecretString::from("test-key-not-real"),
            "claude-sonnet-4-20250514".to_string(),
        )
        .unwrap()
    }

    fn request(model: &str) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            messages: vec![Message::user("Hello")],
            system: Some("Be helpful".to_string()),
            max_tokens: 1024,
            temperature: Some(0.7),
            stream: false,
            stop_sequences: None,
            tools: Vec::new(),
        }
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(make_provider().name(), "anthropic");
        assert_eq!(make_provider().with_name("claude-backup").name(), "claude-backup");
    }

    #[test]
    fn test_capabilities_by_family() {
        assert_eq!(make_provider().capabilities().max_output_tokens, 8_192);

        let opus = AnthropicProvider::new(SecretString::from("k"), "claude-opus-4".into()).unwrap();
        assert_eq!(opus.capabilities().max_output_tokens, 32_000);

        let unknown = AnthropicProvider::new(SecretString::from("k"), "mystery".into()).unwrap();
        assert_eq!(unknown.capabilities().max_output_tokens, 4_096);
        assert!(unknown.capabilities().tool_calling);
    }

    #[test]
    fn test_to_anthropic_request() {
        let provider = make_provider();
        let req = provider.to_anthropic_request(&request("claude-haiku-4"), true);
        assert_eq!(req.model, "claude-haiku-4");
        assert!(req.stream);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, "user");
        assert_eq!(req.system.as_deref(), Some("Be helpful"));
    }

    #[test]
    fn test_empty_model_uses_default() {
        let req = make_provider().to_anthropic_request(&request(""), false);
        assert_eq!(req.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_tools_use_input_schema() {
        let mut r = request("");
        r.tools = vec![ToolDefinition {
            name: "weather".into(),
            description: "Weather lookup".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let json = serde_json::to_value(make_provider().to_anthropic_request(&r, false)).unwrap();
        assert_eq!(json["tools"][0]["name"], "weather");
        assert_eq!(json["tools"][0]["input_schema"]["type"], "object");
    }

    #[test]
    fn test_base_url_override() {
        let provider = make_provider().with_base_url("http://localhost:8080/");
        assert_eq!(provider.url("/v1/messages"), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(map_stop_reason(Some("tool_use")), StopReason::ToolUse);
        assert_eq!(map_stop_reason(Some("max_tokens")), StopReason::MaxTokens);
        assert_eq!(map_stop_reason(Some("pause_turn")), StopReason::EndTurn);
        assert_eq!(map_stop_reason(None), StopReason::EndTurn);
    }

    #[test]
    fn test_overloaded_error_body() {
        let err = map_error_body(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            &reqwest::header::HeaderMap::new(),
            r#"{"type":"error","error":{"type":"overloaded_error","message":"busy"}}"#.into(),
        );
        assert!(matches!(err, LlmError::Overloaded(m) if m == "busy"));
    }
}
