//! Multi-turn conversation state.
//!
//! A session holds an optional leading system turn plus an ordered history.
//! After every append the buffer is compacted if the history exceeds the
//! configured message count or the running token total exceeds the context
//! window. Compaction either collapses older turns into a summary produced
//! through the dispatcher, or drops the oldest turns. The system turn is
//! never evicted and the newest turn is always retained.

pub mod sessions;
pub mod summarizer;
pub mod tokens;

use std::collections::VecDeque;

use tokio::sync::Mutex;

use switchyard_types::analytics::ConversationStats;
use switchyard_types::config::ConversationConfig;
use switchyard_types::llm::{Message, MessageRole, Usage};

use self::summarizer::ContextSummarizer;
use self::tokens::estimate_tokens;

/// One message in a session's history.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub role: MessageRole,
    pub content: String,
    pub tokens: u64,
    /// Produced by compaction rather than by a caller.
    pub synthetic: bool,
}

impl ConversationTurn {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            role,
            tokens: estimate_tokens(&content),
            content,
            synthetic: false,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    fn summary(text: &str) -> Self {
        Self {
            synthetic: true,
            ..Self::assistant(format!("[Summary of earlier conversation]\n{text}"))
        }
    }

    pub fn to_message(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// What an append did to the buffer.
#[derive(Debug, Clone, Default)]
pub struct AppendReport {
    /// Compaction ran.
    pub compacted: bool,
    /// Turns collapsed into a summary.
    pub summarized: usize,
    /// Turns dropped outright.
    pub dropped: usize,
    /// Usage and model of the summarization call, to be billed by the caller.
    pub summary_usage: Option<(Usage, String)>,
}

#[derive(Debug, Default)]
struct Buffer {
    system: Option<ConversationTurn>,
    turns: VecDeque<ConversationTurn>,
    /// System turn included.
    total_tokens: u64,
    summaries: u64,
}

impl Buffer {
    fn push(&mut self, turn: ConversationTurn) {
        if turn.role == MessageRole::System {
            if let Some(old) = self.system.take() {
                self.total_tokens -= old.tokens;
            }
            self.total_tokens += turn.tokens;
            self.system = Some(turn);
        } else {
            self.total_tokens += turn.tokens;
            self.turns.push_back(turn);
        }
    }

    fn pop_oldest(&mut self) -> Option<ConversationTurn> {
        let turn = self.turns.pop_front()?;
        self.total_tokens -= turn.tokens;
        Some(turn)
    }

    /// System turn included.
    fn message_count(&self) -> usize {
        self.turns.len() + usize::from(self.system.is_some())
    }

    /// Room left for non-system turns under the message limit.
    fn history_capacity(&self, config: &ConversationConfig) -> usize {
        max_messages(config) - usize::from(self.system.is_some())
    }

    fn over_limit(&self, config: &ConversationConfig) -> bool {
        self.message_count() > max_messages(config)
            || self.total_tokens > config.context_window_tokens
    }

    fn stats(&self) -> ConversationStats {
        ConversationStats {
            message_count: self.message_count(),
            token_count: self.total_tokens,
            summaries: self.summaries,
        }
    }
}

/// The system turn plus the newest turn always fit.
fn max_messages(config: &ConversationConfig) -> usize {
    config.max_messages.max(2)
}

/// One session's turn history.
#[derive(Debug)]
pub struct ConversationState {
    config: ConversationConfig,
    summarizer: Option<ContextSummarizer>,
    buffer: Mutex<Buffer>,
}

impl ConversationState {
    /// `summarizer` is only used when `config.summarize` is set.
    pub fn new(config: ConversationConfig, summarizer: Option<ContextSummarizer>) -> Self {
        let summarizer = summarizer.filter(|_| config.summarize);
        Self {
            config,
            summarizer,
            buffer: Mutex::new(Buffer::default()),
        }
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    pub async fn append(&self, turn: ConversationTurn) -> AppendReport {
        self.append_many(vec![turn]).await
    }

    /// Append several turns, then compact once.
    ///
    /// The buffer lock is held across the summarization call, so concurrent
    /// appends to the same session wait instead of compacting twice.
    pub async fn append_many(&self, turns: Vec<ConversationTurn>) -> AppendReport {
        let mut buffer = self.buffer.lock().await;
        for turn in turns {
            buffer.push(turn);
        }

        let mut report = AppendReport::default();
        if !buffer.over_limit(&self.config) {
            return report;
        }
        report.compacted = true;

        if let Some(summarizer) = &self.summarizer {
            let keep = (buffer.history_capacity(&self.config) / 2).max(1);
            let history: Vec<Message> = buffer.turns.iter().map(|t| t.to_message()).collect();
            let (older, _) = ContextSummarizer::select_messages_to_summarize(&history, keep);

            if older.len() > 1 {
                match summarizer.summarize(older).await {
                    Ok(summary) => {
                        for _ in 0..older.len() {
                            buffer.pop_oldest();
                        }
                        let turn = ConversationTurn::summary(&summary.text);
                        buffer.total_tokens += turn.tokens;
                        buffer.turns.push_front(turn);
                        buffer.summaries += 1;
                        report.summarized = older.len();
                        report.summary_usage = Some((summary.usage, summary.model));
                        tracing::debug!(
                            summarized = report.summarized,
                            provider = %summary.provider,
                            "Conversation compacted into summary"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Summarization failed, dropping oldest turns");
                    }
                }
            }
        }

        while buffer.over_limit(&self.config) && buffer.turns.len() > 1 {
            buffer.pop_oldest();
            report.dropped += 1;
        }
        if report.dropped > 0 {
            tracing::debug!(dropped = report.dropped, "Dropped oldest conversation turns");
        }

        report
    }

    /// Messages to send: system turn first, then history in order.
    pub async fn snapshot_for_request(&self) -> Vec<Message> {
        let buffer = self.buffer.lock().await;
        buffer
            .system
            .iter()
            .chain(buffer.turns.iter())
            .map(ConversationTurn::to_message)
            .collect()
    }

    /// The last `n` non-system turns.
    pub async fn recent(&self, n: usize) -> Vec<ConversationTurn> {
        let buffer = self.buffer.lock().await;
        let skip = buffer.turns.len().saturating_sub(n);
        buffer.turns.iter().skip(skip).cloned().collect()
    }

    /// Clear the history, keeping the system turn.
    pub async fn reset(&self) {
        let mut buffer = self.buffer.lock().await;
        buffer.turns.clear();
        buffer.total_tokens = buffer.system.as_ref().map(|t| t.tokens).unwrap_or(0);
    }

    pub async fn set_system_prompt(&self, text: impl Into<String>) {
        self.append(ConversationTurn::system(text)).await;
    }

    pub async fn stats(&self) -> ConversationStats {
        self.buffer.lock().await.stats()
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(ConversationConfig::default(), None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::budget::pricing::PriceTable;
    use crate::llm::dispatch::{DispatchPolicy, Dispatcher};
    use crate::llm::registry::{BackendSettings, ProviderRegistry};
    use crate::testing::{MOCK_USAGE, MockProvider};
    use switchyard_types::llm::LlmError;

    fn config(max_messages: usize, window: u64, summarize: bool) -> ConversationConfig {
        ConversationConfig {
            max_messages,
            context_window_tokens: window,
            summarize,
            summary_model: None,
        }
    }

    fn summarizer_with(provider: MockProvider) -> ContextSummarizer {
        let registry = Arc::new(ProviderRegistry::default());
        registry.register(provider.boxed(), BackendSettings::default());
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            Arc::new(PriceTable::default()),
            DispatchPolicy::default(),
        ));
        ContextSummarizer::new(dispatcher, None, 1)
    }

    #[tokio::test]
    async fn append_tracks_tokens_and_order() {
        let state = ConversationState::default();
        state.append(ConversationTurn::user("abcdefgh")).await;
        state.append(ConversationTurn::assistant("abcd")).await;

        let stats = state.stats().await;
        assert_eq!(stats.message_count, 2);
        assert_eq!(stats.token_count, 3);

        let messages = state.snapshot_for_request().await;
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].content, "abcd");
    }

    #[tokio::test]
    async fn system_turn_leads_and_is_replaced() {
        let state = ConversationState::default();
        state.append(ConversationTurn::user("hello")).await;
        state.set_system_prompt("be terse").await;
        state.set_system_prompt("be kind").await;

        let messages = state.snapshot_for_request().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[0].content, "be kind");
    }

    #[tokio::test]
    async fn drops_oldest_when_over_message_limit() {
        let state = ConversationState::new(config(3, 10_000, false), None);
        state.set_system_prompt("system").await;
        for i in 0..5 {
            state.append(ConversationTurn::user(format!("message {i}"))).await;
        }

        let messages = state.snapshot_for_request().await;
        assert_eq!(messages[0].content, "system");
        let history: Vec<_> = messages[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(history, vec!["message 3", "message 4"]);
        assert_eq!(state.stats().await.message_count, 3);
    }

    #[tokio::test]
    async fn drops_oldest_when_over_token_window() {
        let state = ConversationState::new(config(100, 10, false), None);
        state.append(ConversationTurn::user("x".repeat(20))).await;
        state.append(ConversationTurn::user("y".repeat(20))).await;
        let report = state.append(ConversationTurn::user("z".repeat(20))).await;

        assert!(report.compacted);
        assert_eq!(report.dropped, 1);
        let stats = state.stats().await;
        assert_eq!(stats.message_count, 2);
        assert_eq!(stats.token_count, 10);
    }

    #[tokio::test]
    async fn no_compaction_below_limits() {
        let state = ConversationState::new(config(3, 10_000, false), None);
        let report = state.append(ConversationTurn::user("hi")).await;
        assert!(!report.compacted);
        assert_eq!(report.dropped, 0);
    }

    #[tokio::test]
    async fn newest_turn_survives_an_oversized_append() {
        let state = ConversationState::new(config(5, 4, false), None);
        state.set_system_prompt("system prompt").await;
        state.append(ConversationTurn::user("x".repeat(400))).await;

        let recent = state.recent(5).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].tokens, 100);
        assert_eq!(state.snapshot_for_request().await[0].content, "system prompt");
    }

    #[tokio::test]
    async fn message_limit_holds_after_any_sequence() {
        let state = ConversationState::new(config(4, 50, false), None);
        state.set_system_prompt("sys").await;
        for i in 0..30 {
            let turn = if i % 3 == 0 {
                ConversationTurn::assistant("a".repeat(i * 7))
            } else {
                ConversationTurn::user(format!("turn {i}"))
            };
            state.append(turn).await;
            let messages = state.snapshot_for_request().await;
            assert!(messages.len() <= 4);
            assert!(state.stats().await.message_count <= 4);
            assert_eq!(messages[0].content, "sys");
        }
    }

    #[tokio::test]
    async fn summarizes_older_turns() {
        let provider = MockProvider::replying("local", "They talked about trains.");
        let calls = provider.calls();
        let state = ConversationState::new(config(4, 10_000, true), Some(summarizer_with(provider)));

        for i in 0..4 {
            state.append(ConversationTurn::user(format!("q{i}"))).await;
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);

        let report = state.append(ConversationTurn::user("q4")).await;
        assert!(report.compacted);
        assert_eq!(report.summarized, 3);
        assert_eq!(report.dropped, 0);
        let (usage, model) = report.summary_usage.unwrap();
        assert_eq!(usage, MOCK_USAGE);
        assert_eq!(model, "local-model");

        let recent = state.recent(10).await;
        assert_eq!(recent.len(), 3);
        assert!(recent[0].synthetic);
        assert!(recent[0].content.contains("They talked about trains."));
        assert_eq!(recent[1].content, "q3");
        assert_eq!(recent[2].content, "q4");
        assert_eq!(state.stats().await.summaries, 1);
    }

    #[tokio::test]
    async fn summarization_failure_falls_back_to_dropping() {
        let provider = MockProvider::failing("local", LlmError::AuthenticationFailed);
        let state = ConversationState::new(config(2, 10_000, true), Some(summarizer_with(provider)));

        for i in 0..4 {
            state.append(ConversationTurn::user(format!("q{i}"))).await;
        }

        let recent = state.recent(10).await;
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|t| !t.synthetic));
        assert_eq!(recent[1].content, "q3");
    }

    #[tokio::test]
    async fn summarizer_ignored_when_disabled() {
        let provider = MockProvider::ok("local");
        let calls = provider.calls();
        let state =
            ConversationState::new(config(2, 10_000, false), Some(summarizer_with(provider)));
        for i in 0..5 {
            state.append(ConversationTurn::user(format!("q{i}"))).await;
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(state.recent(10).await.len(), 2);
    }

    #[tokio::test]
    async fn summary_leaves_room_for_system_turn() {
        let provider = MockProvider::replying("local", "Earlier questions about trains.");
        let state = ConversationState::new(config(5, 10_000, true), Some(summarizer_with(provider)));
        state.set_system_prompt("sys").await;
        for i in 0..5 {
            state.append(ConversationTurn::user(format!("q{i}"))).await;
        }

        assert!(state.stats().await.message_count <= 5);
        let messages = state.snapshot_for_request().await;
        assert_eq!(messages[0].content, "sys");
        assert!(messages[1].content.contains("Earlier questions about trains."));
        assert_eq!(messages.last().unwrap().content, "q4");
    }

    #[tokio::test]
    async fn reset_keeps_system_turn() {
        let state = ConversationState::default();
        state.set_system_prompt("abcd").await;
        state.append(ConversationTurn::user("hello there")).await;
        state.reset().await;

        let stats = state.stats().await;
        assert_eq!(stats.message_count, 1);
        assert_eq!(stats.token_count, 1);
        assert!(state.recent(5).await.is_empty());
    }
}
