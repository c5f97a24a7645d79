//! Default plus named conversation sessions.

use std::sync::Arc;

use dashmap::DashMap;

use switchyard_types::config::ConversationConfig;

use super::ConversationState;
use super::summarizer::ContextSummarizer;

/// Each session is locked independently; named sessions are created on
/// first use.
#[derive(Debug)]
pub struct SessionStore {
    config: ConversationConfig,
    summarizer: Option<ContextSummarizer>,
    default: Arc<ConversationState>,
    named: DashMap<String, Arc<ConversationState>>,
}

impl SessionStore {
    pub fn new(config: ConversationConfig, summarizer: Option<ContextSummarizer>) -> Self {
        let default = Arc::new(ConversationState::new(config.clone(), summarizer.clone()));
        Self {
            config,
            summarizer,
            default,
            named: DashMap::new(),
        }
    }

    /// The named session, or the default one for `None`.
    pub fn get(&self, session: Option<&str>) -> Arc<ConversationState> {
        match session {
            None => Arc::clone(&self.default),
            Some(name) => Arc::clone(
                self.named
                    .entry(name.to_string())
                    .or_insert_with(|| {
                        tracing::debug!(session = name, "Creating conversation session");
                        Arc::new(ConversationState::new(
                            self.config.clone(),
                            self.summarizer.clone(),
                        ))
                    })
                    .value(),
            ),
        }
    }

    pub fn default_session(&self) -> &Arc<ConversationState> {
        &self.default
    }

    /// Forget a named session. The default session cannot be removed.
    pub fn remove(&self, name: &str) -> bool {
        self.named.remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.named.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
