//! OpenAI-compatible backend.
//!
//! A single [`OpenAiCompatibleProvider`] serves DeepSeek, OpenAI, Mistral,
//! Ollama, and any other chat-completions endpoint via a configurable base
//! URL.

pub mod config;
pub mod streaming;
pub mod types;

use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};

use switchyard_core::llm::dispatch::EventStream;
use switchyard_core::llm::provider::LlmProvider;
use switchyard_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason, Usage,
};
use switchyard_types::tool::ToolCall;

use self::config::OpenAiCompatConfig;
use self::streaming::create_openai_stream;
use self::types::{
    ChatFunction, ChatMessage, ChatRequest, ChatResponse, ChatStreamOptions, ChatTool,
    ErrorEnvelope,
};
use super::http::{build_client, map_send_error, map_status};

/// Backend for any chat-completions API.
///
/// Does NOT derive Debug: the API key lives in a [`SecretString`] and the
/// provider is never printed.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    provider_name: String,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    capabilities: ProviderCapabilities,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_client()?,
            provider_name: config.provider_name,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            model: config.model,
            capabilities: config.capabilities,
        })
    }

    /// The default model for this backend.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".into(),
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: m.role.to_string(),
            content: m.content.clone(),
        }));

        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };

        ChatRequest {
            model,
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            stop: request.stop_sequences.clone().filter(|s| !s.is_empty()),
            stream,
            stream_options: stream.then_some(ChatStreamOptions {
                include_usage: true,
            }),
            tools: request
                .tools
                .iter()
                .map(|t| ChatTool {
                    kind: "function",
                    function: ChatFunction {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters.clone(),
                    },
                })
                .collect(),
        }
    }

    fn post(&self, body: &ChatRequest) -> reqwest::RequestBuilder {
        let builder = self.client.post(self.url()).json(body);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(request, false);
        tracing::debug!(provider = %self.provider_name, model = %body.model, "Sending chat completion");

        let response = self.post(&body).send().await.map_err(map_send_error)?;
        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(map_error_body(status, &headers, text));
        }

        let resp: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Deserialization("response has no choices".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| {
                let arguments = if tc.function.arguments.trim().is_empty() {
                    serde_json::Value::Object(Default::default())
                } else {
                    serde_json::from_str(&tc.function.arguments).map_err(|e| {
                        LlmError::Deserialization(format!(
                            "tool call JSON for '{}': {e}",
                            tc.function.name
                        ))
                    })?
                };
                Ok(ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                })
            })
            .collect::<Result<Vec<_>, LlmError>>()?;

        let stop_reason = choice
            .finish_reason
            .as_deref()
            .and_then(|r| StopReason::from_str(r).ok())
            .unwrap_or(StopReason::EndTurn);

        let usage = resp
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: resp.id,
            content: choice.message.content.unwrap_or_default(),
            model: if resp.model.is_empty() { body.model } else { resp.model },
            stop_reason,
            usage,
            tool_calls,
        })
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        let body = self.build_request(&request, true);
        create_openai_stream(self.post(&body))
    }
}

/// Status mapping, refined by the vendor's error code when the body has one.
fn map_error_body(
    status: reqwest::StatusCode,
    headers: &reqwest::header::HeaderMap,
    text: String,
) -> LlmError {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&text) {
        let code = envelope
            .error
            .code
            .as_ref()
            .and_then(|c| c.as_str())
            .unwrap_or_default();
        if code == "context_length_exceeded" {
            return LlmError::InvalidRequest(envelope.error.message);
        }
        return map_status(status, headers, envelope.error.message);
    }
    map_status(status, headers, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_types::llm::Message;
    use switchyard_types::tool::ToolDefinition;

    fn make_provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(config::deepseek_defaults(
            Some(SecretString::from("test-key-not-real")),
            "deepseek-chat",
        ))
        .unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: String::new(),
            messages: vec![Message::user("Hello")],
            system: Some("Be helpful".to_string()),
            max_tokens: 256,
            temperature: Some(0.2),
            stream: false,
            stop_sequences: Some(Vec::new()),
            tools: Vec::new(),
        }
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(make_provider().name(), "deepseek");
    }

    #[test]
    fn test_build_request_prepends_system_and_fills_model() {
        let req = make_provider().build_request(&request(), false);
        assert_eq!(req.model, "deepseek-chat");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, "system");
        assert_eq!(req.messages[1].role, "user");
        assert!(req.stop.is_none());
        assert!(req.stream_options.is_none());
    }

    #[test]
    fn test_build_request_streaming_asks_for_usage() {
        let mut r = request();
        r.model = "deepseek-reasoner".into();
        let req = make_provider().build_request(&r, true);
        assert_eq!(req.model, "deepseek-reasoner");
        assert!(req.stream);
        assert!(req.stream_options.unwrap().include_usage);
    }

    #[test]
    fn test_build_request_maps_tools() {
        let mut r = request();
        r.tools = vec![ToolDefinition {
            name: "weather".into(),
            description: "Weather".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let req = make_provider().build_request(&r, false);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "weather");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let mut config = config::ollama_defaults("llama3");
        config.base_url = "http://localhost:11434/v1/".into();
        let provider = OpenAiCompatibleProvider::new(config).unwrap();
        assert_eq!(provider.url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_error_body_refines_status() {
        let headers = reqwest::header::HeaderMap::new();
        let err = map_error_body(
            reqwest::StatusCode::BAD_REQUEST,
            &headers,
            r#"{"error":{"message":"too long","code":"context_length_exceeded"}}"#.into(),
        );
        assert!(matches!(err, LlmError::InvalidRequest(m) if m == "too long"));

        let err = map_error_body(
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            &headers,
            "upstream down".into(),
        );
        assert!(matches!(err, LlmError::Provider { .. }));
    }
}
