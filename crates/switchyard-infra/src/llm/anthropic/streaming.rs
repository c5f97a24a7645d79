//! SSE stream state machine for the Anthropic Messages API.
//!
//! Protocol:
//! 1. `message_start` carries the message object with input usage
//! 2. Per block: `content_block_start`, N x `content_block_delta`, `content_block_stop`
//! 3. `message_delta` carries the stop reason and output usage
//! 4. `message_stop` ends the message
//! 5. `ping` may appear anywhere; `error` may appear mid-stream
//!
//! Tool use input arrives as partial JSON via `input_json_delta`, accumulated
//! per block index and parsed at `content_block_stop`.

use std::collections::HashMap;

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use switchyard_core::llm::dispatch::EventStream;
use switchyard_types::llm::{LlmError, StreamEvent, Usage};
use switchyard_types::tool::ToolCall;

use super::client::{API_VERSION, map_stop_reason};
use super::types::{
    AnthropicContentBlock, AnthropicDelta, AnthropicRequest, ContentBlockDeltaPayload,
    ContentBlockStartPayload, ContentBlockStopPayload, ErrorPayload, MessageDeltaPayload,
    MessageStartPayload,
};
use crate::llm::http::send_streaming;

struct PendingToolUse {
    id: String,
    name: String,
    json_buffer: String,
}

/// Maps named SSE events to stream events.
#[derive(Default)]
pub struct AnthropicDecoder {
    tools: HashMap<u32, PendingToolUse>,
    stopped: bool,
}

fn parse<T: DeserializeOwned>(event: &str, data: &str) -> Result<T, LlmError> {
    serde_json::from_str(data)
        .map_err(|e| LlmError::Deserialization(format!("{event} payload: {e}")))
}

impl AnthropicDecoder {
    /// Whether `message_stop` has been seen.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn push(&mut self, event: &str, data: &str) -> Result<Vec<StreamEvent>, LlmError> {
        let mut out = Vec::new();
        match event {
            "message_start" => {
                let payload: MessageStartPayload = parse(event, data)?;
                if let Some(usage) = payload.message.usage
                    && usage.input_tokens > 0
                {
                    out.push(StreamEvent::Usage(Usage {
                        input_tokens: usage.input_tokens,
                        output_tokens: 0,
                    }));
                }
            }
            "content_block_start" => {
                let payload: ContentBlockStartPayload = parse(event, data)?;
                match payload.content_block {
                    AnthropicContentBlock::Text { text } if !text.is_empty() => {
                        out.push(StreamEvent::TextDelta { text });
                    }
                    AnthropicContentBlock::ToolUse { id, name, .. } => {
                        self.tools.insert(
                            payload.index,
                            PendingToolUse {
                                id,
                                name,
                                json_buffer: String::new(),
                            },
                        );
                    }
                    _ => {}
                }
            }
            "content_block_delta" => {
                let payload: ContentBlockDeltaPayload = parse(event, data)?;
                match payload.delta {
                    AnthropicDelta::TextDelta { text } => {
                        out.push(StreamEvent::TextDelta { text });
                    }
                    AnthropicDelta::InputJsonDelta { partial_json } => {
                        if let Some(pending) = self.tools.get_mut(&payload.index) {
                            pending.json_buffer.push_str(&partial_json);
                        }
                    }
                    AnthropicDelta::Other => {}
                }
            }
            "content_block_stop" => {
                let payload: ContentBlockStopPayload = parse(event, data)?;
                if let Some(pending) = self.tools.remove(&payload.index) {
                    let arguments = if pending.json_buffer.is_empty() {
                        serde_json::Value::Object(Default::default())
                    } else {
                        serde_json::from_str(&pending.json_buffer).map_err(|e| {
                            LlmError::Deserialization(format!(
                                "tool input JSON for '{}': {e}",
                                pending.name
                            ))
                        })?
                    };
                    out.push(StreamEvent::ToolUseComplete(ToolCall {
                        id: pending.id,
                        name: pending.name,
                        arguments,
                    }));
                }
            }
            "message_delta" => {
                let payload: MessageDeltaPayload = parse(event, data)?;
                out.push(StreamEvent::MessageDelta {
                    stop_reason: map_stop_reason(payload.delta.stop_reason.as_deref()),
                });
                if payload.usage.output_tokens > 0 {
                    out.push(StreamEvent::Usage(Usage {
                        input_tokens: 0,
                        output_tokens: payload.usage.output_tokens,
                    }));
                }
            }
            "message_stop" => self.stopped = true,
            "error" => {
                let payload: ErrorPayload = parse(event, data)?;
                return Err(match payload.error.error_type.as_str() {
                    "overloaded_error" => LlmError::Overloaded(payload.error.message),
                    "rate_limit_error" => LlmError::RateLimited {
                        retry_after_ms: None,
                    },
                    _ => LlmError::Stream(payload.error.message),
                });
            }
            // ping and unknown events
            _ => {}
        }
        Ok(out)
    }
}

/// Open a streaming connection to the Messages API.
pub fn create_anthropic_stream(
    client: &reqwest::Client,
    url: &str,
    body: AnthropicRequest,
    api_key: &SecretString,
) -> EventStream {
    let request = client
        .post(url)
        .header("x-api-key", api_key.expose_secret())
        .header("anthropic-version", API_VERSION)
        .json(&body);

    Box::pin(async_stream::try_stream! {
        let response = send_streaming(request).await?;
        yield StreamEvent::Connected;

        let mut decoder = AnthropicDecoder::default();
        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| LlmError::Stream(e.to_string()))?;
            for decoded in decoder.push(&event.event, &event.data)? {
                yield decoded;
            }
            if decoder.is_stopped() {
                break;
            }
        }

        yield StreamEvent::Done;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::anthropic::types::AnthropicMessage;
    use crate::llm::http::{build_client, http_response, serve_once};
    use switchyard_types::llm::StopReason;

    fn request() -> AnthropicRequest {
        AnthropicRequest {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 64,
            messages: vec![AnthropicMessage {
                role: "user".into(),
                content: "Hello".into(),
            }],
            system: None,
            stream: true,
            temperature: None,
            stop_sequences: None,
            tools: Vec::new(),
        }
    }

    #[test]
    fn test_text_message_sequence() {
        let mut d = AnthropicDecoder::default();
        let start = d
            .push(
                "message_start",
                r#"{"type":"message_start","message":{"id":"msg_1","model":"claude-haiku","usage":{"input_tokens":12,"output_tokens":1}}}"#,
            )
            .unwrap();
        assert!(matches!(
            &start[..],
            [StreamEvent::Usage(Usage { input_tokens: 12, output_tokens: 0 })]
        ));

        d.push(
            "content_block_start",
            r#"{"index":0,"content_block":{"type":"text","text":""}}"#,
        )
        .unwrap();
        let delta = d
            .push(
                "content_block_delta",
                r#"{"index":0,"delta":{"type":"text_delta","text":"Hello"}}"#,
            )
            .unwrap();
        assert!(matches!(&delta[..], [StreamEvent::TextDelta { text }] if text == "Hello"));

        assert!(d.push("ping", "{}").unwrap().is_empty());
        assert!(d.push("content_block_stop", r#"{"index":0}"#).unwrap().is_empty());

        let end = d
            .push(
                "message_delta",
                r#"{"delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":5}}"#,
            )
            .unwrap();
        assert!(matches!(
            &end[..],
            [
                StreamEvent::MessageDelta { stop_reason: StopReason::EndTurn },
                StreamEvent::Usage(Usage { input_tokens: 0, output_tokens: 5 }),
            ]
        ));

        d.push("message_stop", "{}").unwrap();
        assert!(d.is_stopped());
    }

    #[test]
    fn test_tool_use_is_assembled_at_block_stop() {
        let mut d = AnthropicDecoder::default();
        d.push(
            "content_block_start",
            r#"{"index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"weather","input":{}}}"#,
        )
        .unwrap();
        d.push(
            "content_block_delta",
            r#"{"index":1,"delta":{"type":"input_json_delta","partial_json":"{\"city\": "}}"#,
        )
        .unwrap();
        d.push(
            "content_block_delta",
            r#"{"index":1,"delta":{"type":"input_json_delta","partial_json":"\"Oslo\"}"}}"#,
        )
        .unwrap();

        let events = d.push("content_block_stop", r#"{"index":1}"#).unwrap();
        match &events[..] {
            [StreamEvent::ToolUseComplete(call)] => {
                assert_eq!(call.id, "toolu_1");
                assert_eq!(call.arguments["city"], "Oslo");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_error_event_maps_to_llm_error() {
        let mut d = AnthropicDecoder::default();
        let err = d
            .push(
                "error",
                r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
            )
            .unwrap_err();
        assert!(matches!(err, LlmError::Overloaded(_)));
    }

    #[tokio::test]
    async fn test_stream_over_http() {
        let body = concat!(
            "event: message_start\ndata: {\"message\":{\"id\":\"msg_1\",\"model\":\"claude-sonnet\",\"usage\":{\"input_tokens\":3,\"output_tokens\":0}}}\n\n",
            "event: content_block_start\ndata: {\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
            "event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hey\"}}\n\n",
            "event: content_block_stop\ndata: {\"index\":0}\n\n",
            "event: message_stop\ndata: {}\n\n",
        );
        let url = serve_once(http_response("200 OK", "text/event-stream", body)).await;
        let client = build_client().unwrap();
        let key = SecretString::from("sk-test".to_string());

        let events: Vec<StreamEvent> = create_anthropic_stream(&client, &url, request(), &key)
            .map(Result::unwrap)
            .collect()
            .await;
        assert!(matches!(events.first(), Some(StreamEvent::Connected)));
        assert!(events
            .iter()
            .any(|e| matches!(e, StreamEvent::TextDelta { text } if text == "Hey")));
        assert!(matches!(events.last(), Some(StreamEvent::Done)));
    }

    #[tokio::test]
    async fn test_overloaded_status_fails_before_connected() {
        let url = serve_once(http_response("529 Overloaded", "application/json", "busy")).await;
        let client = build_client().unwrap();
        let key = SecretString::from("sk-test".to_string());

        let mut stream = create_anthropic_stream(&client, &url, request(), &key);
        assert!(matches!(stream.next().await, Some(Err(LlmError::Overloaded(_)))));
        assert!(stream.next().await.is_none());
    }
}
