//! Context summarizer for conversation compaction.
//!
//! `ContextSummarizer` condenses older conversation turns into a concise
//! summary through the regular dispatcher, so summarization gets the same
//! retry and failover treatment as user requests.

use std::sync::Arc;

use switchyard_types::error::DispatchError;
use switchyard_types::llm::{CompletionRequest, Message, Usage};

use crate::llm::dispatch::Dispatcher;

/// System prompt for the context summarization call.
const SUMMARY_SYSTEM_PROMPT: &str = r#"Summarize the following conversation segment concisely. Preserve:
1. Key decisions and conclusions
2. Important facts mentioned
3. The user's current goals and context
4. Any unresolved questions

Keep the summary under 300 words. Write in third person (e.g., "The user asked about..." "The assistant recommended...")."#;

/// A produced summary and what it cost.
#[derive(Debug, Clone)]
pub struct Summary {
    pub text: String,
    pub usage: Usage,
    pub model: String,
    pub provider: String,
}

#[derive(Debug, Clone)]
pub struct ContextSummarizer {
    dispatcher: Arc<Dispatcher>,
    /// Empty means the serving backend's default model.
    model: String,
    max_retries: u32,
}

impl ContextSummarizer {
    pub fn new(dispatcher: Arc<Dispatcher>, model: Option<String>, max_retries: u32) -> Self {
        Self {
            dispatcher,
            model: model.unwrap_or_default(),
            max_retries,
        }
    }

    /// Summarize a run of messages into a short text.
    #[tracing::instrument(
        name = "summarize_context",
        skip(self, messages),
        fields(
            model = %self.model,
            message_count = messages.len(),
        )
    )]
    pub async fn summarize(&self, messages: &[Message]) -> Result<Summary, DispatchError> {
        let conversation_text: String = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(format!(
                "Please summarize this conversation:\n\n<conversation>\n{conversation_text}\n</conversation>"
            ))],
            system: Some(SUMMARY_SYSTEM_PROMPT.to_string()),
            max_tokens: 512,
            temperature: Some(0.0),
            stream: false,
            stop_sequences: None,
            tools: Vec::new(),
        };

        let outcome = self.dispatcher.dispatch(&request, self.max_retries).await?;
        Ok(Summary {
            text: outcome.response.content.trim().to_string(),
            usage: outcome.response.usage,
            model: outcome.response.model,
            provider: outcome.provider,
        })
    }

    /// Split messages into `(to_summarize, to_keep)`, keeping the most recent
    /// `keep_recent` messages.
    pub fn select_messages_to_summarize<T>(messages: &[T], keep_recent: usize) -> (&[T], &[T]) {
        if messages.len() <= keep_recent {
            (&[], messages)
        } else {
            messages.split_at(messages.len() - keep_recent)
        }
    }
}
