//! Chat completions SSE stream to [`StreamEvent`] adapter.
//!
//! Tool call arguments arrive as partial JSON fragments across chunks, keyed
//! by tool call index. They are accumulated and emitted as
//! [`StreamEvent::ToolUseComplete`] when a finish reason arrives.

use std::collections::BTreeMap;
use std::str::FromStr;

use eventsource_stream::Eventsource;
use futures_util::StreamExt;

use switchyard_core::llm::dispatch::EventStream;
use switchyard_types::llm::{LlmError, StopReason, StreamEvent, Usage};
use switchyard_types::tool::ToolCall;

use super::types::ChatChunk;
use crate::llm::http::send_streaming;

/// Accumulates partial JSON fragments for a tool call during streaming.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    json_buffer: String,
}

/// Turns `data:` payloads into stream events.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    tools: BTreeMap<u32, ToolCallAccumulator>,
    done: bool,
}

impl ChunkDecoder {
    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn push(&mut self, data: &str) -> Result<Vec<StreamEvent>, LlmError> {
        let data = data.trim();
        if data == "[DONE]" {
            self.done = true;
            return Ok(Vec::new());
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let chunk: ChatChunk = serde_json::from_str(data)
            .map_err(|e| LlmError::Deserialization(format!("stream chunk: {e}")))?;

        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content
                && !text.is_empty()
            {
                events.push(StreamEvent::TextDelta { text });
            }

            for tc in choice.delta.tool_calls {
                let acc = self.tools.entry(tc.index).or_default();
                if let Some(id) = tc.id.filter(|id| !id.is_empty()) {
                    acc.id = id;
                }
                if let Some(function) = tc.function {
                    if let Some(name) = function.name.filter(|n| !n.is_empty()) {
                        acc.name = name;
                    }
                    if let Some(args) = function.arguments {
                        acc.json_buffer.push_str(&args);
                    }
                }
            }

            if let Some(reason) = choice.finish_reason {
                events.extend(self.drain_tools()?);
                let stop_reason = StopReason::from_str(&reason).unwrap_or(StopReason::EndTurn);
                events.push(StreamEvent::MessageDelta { stop_reason });
            }
        }

        if let Some(usage) = chunk.usage {
            events.push(StreamEvent::Usage(Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            }));
        }

        Ok(events)
    }

    fn drain_tools(&mut self) -> Result<Vec<StreamEvent>, LlmError> {
        std::mem::take(&mut self.tools)
            .into_values()
            .map(|acc| {
                let arguments = if acc.json_buffer.is_empty() {
                    serde_json::Value::Object(Default::default())
                } else {
                    serde_json::from_str(&acc.json_buffer).map_err(|e| {
                        LlmError::Deserialization(format!("tool call JSON for '{}': {e}", acc.name))
                    })?
                };
                Ok(StreamEvent::ToolUseComplete(ToolCall {
                    id: acc.id,
                    name: acc.name,
                    arguments,
                }))
            })
            .collect()
    }
}

/// Send `request` and map the SSE response body to stream events.
///
/// Emits `Connected` once the response headers arrive and `Done` at the end.
pub fn create_openai_stream(request: reqwest::RequestBuilder) -> EventStream {
    Box::pin(async_stream::try_stream! {
        let response = send_streaming(request).await?;
        yield StreamEvent::Connected;

        let mut decoder = ChunkDecoder::default();
        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| LlmError::Stream(e.to_string()))?;
            for decoded in decoder.push(&event.data)? {
                yield decoded;
            }
            if decoder.is_done() {
                break;
            }
        }

        yield StreamEvent::Done;
    })
}
