//! Request orchestration facade.
//!
//! Each request runs cache lookup, budget admission, conversation snapshot,
//! then dispatch. On success the usage is recorded, the response cached, the
//! exchange appended to the conversation, and analytics updated. Nothing is
//! committed for a request that fails, is cancelled, or (when streaming) is
//! dropped before the stream completes.

pub mod options;

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{Stream, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use switchyard_types::analytics::{Analytics, RequestStats};
use switchyard_types::config::SwitchyardConfig;
use switchyard_types::error::OrchestratorError;
use switchyard_types::llm::{CompletionRequest, Message, MessageRole, StreamEvent, Usage};
use switchyard_types::tool::ToolDefinition;

use crate::budget::{Admission, BudgetController};
use crate::budget::pricing::PriceTable;
use crate::cache::SemanticCache;
use crate::cache::box_embedder::BoxEmbedder;
use crate::conversation::sessions::SessionStore;
use crate::conversation::summarizer::ContextSummarizer;
use crate::conversation::tokens::{estimate_messages, estimate_tokens};
use crate::conversation::{ConversationState, ConversationTurn};
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::dispatch::{DispatchPolicy, Dispatcher};
use crate::llm::health::HealthPolicy;
use crate::llm::provider::LlmProvider;
use crate::llm::registry::{BackendSettings, ProviderRegistry};
use crate::tools::{ToolHandler, ToolRegistry};

pub use self::options::{AIResponse, CACHE_PROVIDER, ChatOptions, StreamOptions};
use self::options::Gating;

/// Stream of text fragments returned by [`Orchestrator::chat_stream`].
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, OrchestratorError>> + Send>>;

#[derive(Debug, Default)]
struct RequestCounters {
    total: AtomicU64,
    cache_hits: AtomicU64,
    dispatched: AtomicU64,
    failed: AtomicU64,
    denied: AtomicU64,
}

impl RequestCounters {
    fn snapshot(&self) -> RequestStats {
        RequestStats {
            total: self.total.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Outgoing request plus what admission needs to know about it.
struct Prepared {
    request: CompletionRequest,
    conversation: Option<Arc<ConversationState>>,
    /// Model used for pricing the admission estimate.
    pricing_model: String,
}

/// The request orchestration engine.
///
/// Cheap to clone: every component is shared.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: Arc<SwitchyardConfig>,
    dispatcher: Arc<Dispatcher>,
    budget: Arc<BudgetController>,
    cache: Arc<SemanticCache>,
    sessions: Arc<SessionStore>,
    tools: Arc<ToolRegistry>,
    counters: Arc<RequestCounters>,
}

impl Orchestrator {
    /// Build an orchestrator with no backends registered.
    ///
    /// Without an embedder the semantic cache never hits.
    pub fn new(config: SwitchyardConfig, embedder: Option<BoxEmbedder>) -> Self {
        let pricing = Arc::new(PriceTable::new(config.pricing.clone()));
        let registry = Arc::new(ProviderRegistry::new(HealthPolicy::from(&config.dispatch)));
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            Arc::clone(&pricing),
            DispatchPolicy::from(&config.dispatch),
        ));
        let budget = Arc::new(BudgetController::new(config.budget.clone(), pricing));
        let cache = Arc::new(SemanticCache::new(config.cache.clone(), embedder.map(Arc::new)));
        let summarizer = ContextSummarizer::new(
            Arc::clone(&dispatcher),
            config.conversation.summary_model.clone(),
            config.dispatch.max_retries,
        );
        let sessions = Arc::new(SessionStore::new(config.conversation.clone(), Some(summarizer)));

        Self {
            config: Arc::new(config),
            dispatcher,
            budget,
            cache,
            sessions,
            tools: Arc::new(ToolRegistry::new()),
            counters: Arc::new(RequestCounters::default()),
        }
    }

    pub fn config(&self) -> &SwitchyardConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        self.dispatcher.registry()
    }

    pub fn budget(&self) -> &Arc<BudgetController> {
        &self.budget
    }

    pub fn cache(&self) -> &Arc<SemanticCache> {
        &self.cache
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Register a backend at `priority` (lower is tried first). Registering
    /// the same name again replaces its configuration.
    pub fn register_provider<P: LlmProvider + 'static>(&self, provider: P, priority: u32) {
        self.register_provider_with(
            BoxLlmProvider::new(provider),
            BackendSettings::with_priority(priority),
        );
    }

    pub fn register_provider_with(&self, provider: BoxLlmProvider, settings: BackendSettings) {
        tracing::info!(provider = %provider.name(), priority = settings.priority, "Registering backend");
        self.dispatcher.registry().register(provider, settings);
    }

    pub fn register_tool<H: ToolHandler + 'static>(&self, definition: ToolDefinition, handler: H) {
        self.tools.register(definition, handler);
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Clear the default session's history, keeping its system prompt.
    pub async fn reset_conversation(&self) {
        self.sessions.default_session().reset().await;
    }

    /// Set the default session's system prompt.
    pub async fn add_system_prompt(&self, text: impl Into<String>) {
        self.sessions.default_session().set_system_prompt(text).await;
    }

    pub fn reset_budget(&self) {
        self.budget.reset();
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Point-in-time view of budget, cache, default conversation, backends,
    /// and request counters.
    pub async fn analytics(&self) -> Analytics {
        Analytics {
            budget: self.budget.current_usage(),
            cache: self.cache.stats(),
            conversation: self.sessions.default_session().stats().await,
            backends: self.dispatcher.registry().stats(),
            requests: self.counters.snapshot(),
        }
    }

    /// Send one prompt and wait for the full response.
    #[tracing::instrument(
        name = "chat",
        skip(self, prompt, options),
        fields(session = options.session.as_deref().unwrap_or("default"))
    )]
    pub async fn chat(
        &self,
        prompt: &str,
        options: ChatOptions,
    ) -> Result<AIResponse, OrchestratorError> {
        let started = Instant::now();
        bump(&self.counters.total);
        check_cancelled(options.cancel.as_ref())?;

        if options.use_cache
            && let Some(content) = self.cached(prompt).await
        {
            self.commit_cache_hit(prompt, &content, options.use_conversation, options.session.as_deref())
                .await;
            return Ok(AIResponse {
                content,
                cached: true,
                provider: CACHE_PROVIDER.to_string(),
                model: String::new(),
                usage: Usage::default(),
                latency: started.elapsed(),
                failover_warning: None,
                tool_results: Vec::new(),
            });
        }

        let mut prepared = self
            .prepare(prompt, Gating::from(&options), options.session.as_deref())
            .await;
        if options.use_tools {
            prepared.request.tools = self.tools.definitions();
        }
        self.admit(&prepared, options.use_budget)?;

        bump(&self.counters.dispatched);
        let dispatch = self
            .dispatcher
            .dispatch(&prepared.request, options.max_retries);
        let outcome = match cancellable(options.cancel.as_ref(), dispatch).await {
            Some(Ok(outcome)) => outcome,
            Some(Err(e)) => {
                bump(&self.counters.failed);
                tracing::warn!(error = %e, "Chat failed");
                return Err(e.into());
            }
            None => {
                tracing::info!("Chat cancelled");
                return Err(OrchestratorError::Cancelled);
            }
        };

        if let Some(warning) = &outcome.failover_warning {
            tracing::warn!(provider = %outcome.provider, "{warning}");
        }

        let response = outcome.response;
        let store = options.use_cache && self.is_cacheable(&outcome.provider);
        self.commit(prompt, &response.content, &response.usage, &response.model, store, prepared.conversation.as_deref())
            .await;

        let mut tool_results = Vec::new();
        if options.use_tools && !response.tool_calls.is_empty() {
            for (result, error) in self.tools.execute_all(&response.tool_calls).await {
                if let Some(error) = error
                    && options.require_tool_output
                {
                    return Err(error.into());
                }
                tool_results.push(result);
            }
        }

        Ok(AIResponse {
            content: response.content,
            cached: false,
            provider: outcome.provider,
            model: response.model,
            usage: response.usage,
            latency: started.elapsed(),
            failover_warning: outcome.failover_warning,
            tool_results,
        })
    }

    /// Send one prompt and stream the response as text fragments.
    ///
    /// The stream is lazy: nothing happens until it is polled. Failures
    /// before the first fragment go through the usual failover; failures
    /// after it end the stream with [`OrchestratorError::Stream`].
    /// Bookkeeping happens only once the backend signals completion.
    pub fn chat_stream(&self, prompt: &str, options: StreamOptions) -> FragmentStream {
        let this = self.clone();
        let prompt = prompt.to_string();

        Box::pin(async_stream::try_stream! {
            bump(&this.counters.total);
            check_cancelled(options.cancel.as_ref())?;

            if options.use_cache
                && let Some(content) = this.cached(&prompt).await
            {
                this.commit_cache_hit(&prompt, &content, options.use_conversation, options.session.as_deref())
                    .await;
                yield content;
                return;
            }

            let prepared = this
                .prepare(&prompt, Gating::from(&options), options.session.as_deref())
                .await;
            this.admit(&prepared, options.use_budget)?;

            bump(&this.counters.dispatched);
            let dispatch = this
                .dispatcher
                .dispatch_stream(&prepared.request, options.max_retries);
            let opened = match cancellable(options.cancel.as_ref(), dispatch).await {
                Some(Ok(opened)) => opened,
                Some(Err(e)) => {
                    bump(&this.counters.failed);
                    Err(OrchestratorError::from(e))?
                }
                None => Err(OrchestratorError::Cancelled)?,
            };
            if let Some(warning) = &opened.failover_warning {
                tracing::warn!(provider = %opened.provider, "{warning}");
            }

            let mut events = opened.stream;
            let mut content = String::new();
            let mut usage = Usage::default();
            loop {
                let next = match cancellable(options.cancel.as_ref(), events.next()).await {
                    Some(next) => next,
                    None => Err(OrchestratorError::Cancelled)?,
                };
                match next {
                    None | Some(Ok(StreamEvent::Done)) => break,
                    Some(Ok(StreamEvent::TextDelta { text })) => {
                        content.push_str(&text);
                        yield text;
                    }
                    Some(Ok(StreamEvent::Usage(u))) => usage = usage.merge(&u),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        bump(&this.counters.failed);
                        Err(OrchestratorError::Stream(e))?;
                    }
                }
            }

            if usage.total() == 0 {
                usage = Usage {
                    input_tokens: estimate_messages(
                        prepared.request.system.as_deref(),
                        &prepared.request.messages,
                    ) as u32,
                    output_tokens: estimate_tokens(&content) as u32,
                };
            }
            let store = options.use_cache && this.is_cacheable(&opened.provider);
            this.commit(&prompt, &content, &usage, &opened.model, store, prepared.conversation.as_deref())
                .await;
        })
    }

    /// Whether responses from `provider` may be cached.
    fn is_cacheable(&self, provider: &str) -> bool {
        self.dispatcher
            .registry()
            .get(provider)
            .is_some_and(|entry| entry.provider.capabilities().cacheable)
    }

    /// Cache lookup that degrades to a miss on error.
    async fn cached(&self, prompt: &str) -> Option<String> {
        match self.cache.lookup(prompt).await {
            Ok(Some(content)) => {
                bump(&self.counters.cache_hits);
                tracing::debug!("Semantic cache hit");
                Some(content)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn commit_cache_hit(
        &self,
        prompt: &str,
        content: &str,
        use_conversation: bool,
        session: Option<&str>,
    ) {
        if use_conversation {
            let conversation = self.sessions.get(session);
            self.append_exchange(&conversation, prompt, content).await;
        }
    }

    async fn prepare(&self, prompt: &str, gating: Gating<'_>, session: Option<&str>) -> Prepared {
        let dispatch = &self.config.dispatch;
        let conversation = gating.use_conversation.then(|| self.sessions.get(session));

        let mut system = None;
        let mut messages = Vec::new();
        if let Some(conversation) = &conversation {
            for message in conversation.snapshot_for_request().await {
                if message.role == MessageRole::System {
                    system = Some(message.content);
                } else {
                    messages.push(message);
                }
            }
        }
        messages.push(Message::user(prompt));

        let model = gating.model.unwrap_or_default().to_string();
        let pricing_model = if model.is_empty() {
            self.dispatcher
                .registry()
                .ranked()
                .first()
                .and_then(|entry| entry.settings.model.clone())
                .unwrap_or_default()
        } else {
            model.clone()
        };

        Prepared {
            request: CompletionRequest {
                model,
                messages,
                system,
                max_tokens: gating.params.max_tokens.unwrap_or(dispatch.default_max_tokens),
                temperature: gating.params.temperature.or(Some(dispatch.default_temperature)),
                stream: false,
                stop_sequences: gating.params.stop_sequences.clone(),
                tools: Vec::new(),
            },
            conversation,
            pricing_model,
        }
    }

    /// Budget admission for a prepared request. Consumes nothing.
    fn admit(&self, prepared: &Prepared, use_budget: bool) -> Result<(), OrchestratorError> {
        if !use_budget {
            return Ok(());
        }
        let request = &prepared.request;
        let estimate = estimate_messages(request.system.as_deref(), &request.messages)
            + u64::from(request.max_tokens);
        match self.budget.admit(estimate, &prepared.pricing_model) {
            Admission::Allowed => Ok(()),
            Admission::Denied(reason) => {
                bump(&self.counters.denied);
                Err(OrchestratorError::BudgetExceeded(reason))
            }
        }
    }

    /// Record usage, cache the response when `store` is set, and append the
    /// exchange.
    async fn commit(
        &self,
        prompt: &str,
        content: &str,
        usage: &Usage,
        model: &str,
        store: bool,
        conversation: Option<&ConversationState>,
    ) {
        self.budget.record(usage, model);

        if store
            && !content.is_empty()
            && let Err(e) = self.cache.store(prompt, content).await
        {
            tracing::warn!(error = %e, "Cache store failed");
        }

        if let Some(conversation) = conversation {
            self.append_exchange(conversation, prompt, content).await;
        }
    }

    async fn append_exchange(&self, conversation: &ConversationState, prompt: &str, content: &str) {
        let report = conversation
            .append_many(vec![
                ConversationTurn::user(prompt),
                ConversationTurn::assistant(content),
            ])
            .await;
        if let Some((usage, model)) = report.summary_usage {
            self.budget.record(&usage, &model);
        }
    }
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<(), OrchestratorError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(OrchestratorError::Cancelled),
        _ => Ok(()),
    }
}

/// Run `fut` unless `cancel` fires first. `None` means cancelled.
async fn cancellable<F: std::future::Future>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Option<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => None,
            out = fut => Some(out),
        },
        None => Some(fut.await),
    }
}
