//! Fallback/retry dispatch across ranked backends.
//!
//! Backends are tried in registry order. Each failed attempt is classified:
//! retryable failures are retried on the same backend with exponential
//! backoff, fatal failures move on to the next backend. Backends whose
//! circuit is open, that are rate-limited, or whose health probe fails are
//! skipped without an attempt.
//!
//! Attempts are strictly sequential so a request is never billed twice.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::time::Instant;
use tracing::{Instrument, info_span};

use switchyard_types::config::DispatchConfig;
use switchyard_types::error::{BackendFailure, DispatchError, FailureClass};
use switchyard_types::llm::{CompletionRequest, CompletionResponse, LlmError, StreamEvent};

use crate::budget::pricing::PriceTable;

use super::registry::{BackendEntry, ProviderRegistry};

/// Stream of normalized backend events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Classify a per-attempt error.
///
/// Retryable: transient conditions that may clear on the same backend
/// (timeouts, rate limits, overload, 5xx, dropped connections, broken streams).
/// Fatal: the same request will keep failing on this backend (credentials,
/// malformed request, context length, unparseable response).
pub fn classify(error: &LlmError) -> FailureClass {
    match error {
        LlmError::Timeout { .. }
        | LlmError::RateLimited { .. }
        | LlmError::Overloaded(..)
        | LlmError::Provider { .. }
        | LlmError::Connection(..)
        | LlmError::Stream(..) => FailureClass::Retryable,
        LlmError::AuthenticationFailed
        | LlmError::InvalidRequest(..)
        | LlmError::ContextLengthExceeded { .. }
        | LlmError::Deserialization(..) => FailureClass::Fatal,
    }
}

/// Retry and timeout policy.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub default_timeout: Duration,
    /// Failover cost ratio above which the warning carries a cost note.
    pub cost_warning_multiplier: f64,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for DispatchPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            default_timeout: Duration::from_millis(config.default_timeout_ms),
            cost_warning_multiplier: config.cost_warning_multiplier,
        }
    }
}

impl DispatchPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    ///
    /// `base_delay * 2^(attempt-1)`, raised to a rate-limit `retry_after`
    /// hint, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32, error: &LlmError) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        let delay = match error {
            LlmError::RateLimited {
                retry_after_ms: Some(ms),
            } => delay.max(Duration::from_millis(*ms)),
            _ => delay,
        };
        delay.min(self.max_delay)
    }
}

/// Result of a successful dispatch.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub response: CompletionResponse,
    /// Identifier of the backend that served the request.
    pub provider: String,
    /// Attempts made on the serving backend.
    pub attempts: u32,
    /// Wall time from dispatch start, backoffs and failed backends included.
    pub latency: Duration,
    /// Set when a non-primary backend served the request.
    pub failover_warning: Option<String>,
}

/// Result of a successful streaming dispatch: the first fragment has arrived.
pub struct StreamDispatch {
    pub stream: EventStream,
    pub provider: String,
    pub model: String,
    pub failover_warning: Option<String>,
}

impl std::fmt::Debug for StreamDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDispatch")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("failover_warning", &self.failover_warning)
            .field("stream", &"<stream>")
            .finish()
    }
}

enum DispatchState {
    /// Consider the candidate at `idx`.
    NextBackend { idx: usize },
    Trying { idx: usize, attempt: u32 },
    BackingOff { idx: usize, attempt: u32, delay: Duration },
    Exhausted,
}

struct Served<T> {
    value: T,
    entry: Arc<BackendEntry>,
    model: String,
    attempts: u32,
    latency: Duration,
    failover_warning: Option<String>,
}

/// Routes requests through the ranked backends with retry and failover.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    pricing: Arc<PriceTable>,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        pricing: Arc<PriceTable>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            registry,
            pricing,
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn pricing(&self) -> &Arc<PriceTable> {
        &self.pricing
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Send a completion request through the ranked backends.
    ///
    /// `max_retries` is the maximum number of attempts per backend (at least 1).
    #[tracing::instrument(
        name = "dispatch",
        skip(self, request),
        fields(model = %request.model, message_count = request.messages.len())
    )]
    pub async fn dispatch(
        &self,
        request: &CompletionRequest,
        max_retries: u32,
    ) -> Result<DispatchOutcome, DispatchError> {
        let served = self
            .run(request, max_retries, |entry, routed, timeout| async move {
                match tokio::time::timeout(timeout, entry.provider.complete(&routed)).await {
                    Ok(result) => result,
                    Err(_) => Err(LlmError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                }
            })
            .await?;

        Ok(DispatchOutcome {
            response: served.value,
            provider: served.entry.id.clone(),
            attempts: served.attempts,
            latency: served.latency,
            failover_warning: served.failover_warning,
        })
    }

    /// Open a stream through the ranked backends.
    ///
    /// An attempt succeeds once the first content event (or a clean end of
    /// stream) arrives; until then the usual retry and failover rules apply.
    /// Errors after that point are not failed over: they are yielded to the
    /// caller and recorded against the serving backend.
    #[tracing::instrument(
        name = "dispatch_stream",
        skip(self, request),
        fields(model = %request.model, message_count = request.messages.len())
    )]
    pub async fn dispatch_stream(
        &self,
        request: &CompletionRequest,
        max_retries: u32,
    ) -> Result<StreamDispatch, DispatchError> {
        let served = self.run(request, max_retries, open_stream).await?;

        let entry = Arc::clone(&served.entry);
        let opened = Instant::now();
        let stream = served.value.inspect(move |item| {
            if let Err(err) = item {
                tracing::warn!(provider = %entry.id, error = %err, "Stream failed after first fragment");
                entry.with_health(|h| h.record_failure(err, opened.elapsed()));
            }
        });

        Ok(StreamDispatch {
            stream: Box::pin(stream),
            provider: served.entry.id.clone(),
            model: served.model,
            failover_warning: served.failover_warning,
        })
    }

    async fn run<T, F, Fut>(
        &self,
        request: &CompletionRequest,
        max_retries: u32,
        mut attempt_fn: F,
    ) -> Result<Served<T>, DispatchError>
    where
        F: FnMut(Arc<BackendEntry>, CompletionRequest, Duration) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let candidates = self.registry.ranked();
        if candidates.is_empty() {
            return Err(DispatchError::NoProviders);
        }

        let max_attempts = max_retries.max(1);
        let started = Instant::now();
        let mut failures: Vec<BackendFailure> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();
        let mut last_error: Option<LlmError> = None;
        let mut state = DispatchState::NextBackend { idx: 0 };

        loop {
            state = match state {
                DispatchState::NextBackend { idx } => match candidates.get(idx) {
                    None => DispatchState::Exhausted,
                    Some(entry) => {
                        if self.is_eligible(entry).await {
                            last_error = None;
                            DispatchState::Trying { idx, attempt: 1 }
                        } else {
                            tracing::debug!(provider = %entry.id, "Backend unavailable, skipping");
                            skipped.push(entry.id.clone());
                            DispatchState::NextBackend { idx: idx + 1 }
                        }
                    }
                },

                DispatchState::Trying { idx, attempt } => {
                    let entry = &candidates[idx];

                    // The circuit may have opened between retries.
                    if attempt > 1 && !self.is_eligible(entry).await {
                        if let Some(error) = last_error.take() {
                            failures.push(BackendFailure {
                                backend: entry.id.clone(),
                                class: FailureClass::Retryable,
                                attempts: attempt - 1,
                                error,
                            });
                        }
                        DispatchState::NextBackend { idx: idx + 1 }
                    } else {
                        let routed = route(entry, request);
                        let model = routed.model.clone();
                        let timeout = entry.settings.timeout.unwrap_or(self.policy.default_timeout);
                        let span = info_span!(
                            "gen_ai.attempt",
                            gen_ai.provider.name = %entry.id,
                            gen_ai.request.model = %model,
                            gen_ai.request.max_tokens = routed.max_tokens,
                            attempt,
                        );

                        let call_start = Instant::now();
                        let result = attempt_fn(Arc::clone(entry), routed, timeout)
                            .instrument(span)
                            .await;
                        let latency = call_start.elapsed();

                        match result {
                            Ok(value) => {
                                entry.with_health(|h| h.record_success(latency));
                                let failover_warning =
                                    self.build_failover_warning(&candidates[0], entry, &request.model);
                                if let Some(ref warning) = failover_warning {
                                    tracing::warn!(%warning, "Failover occurred");
                                }
                                tracing::debug!(
                                    provider = %entry.id,
                                    attempt,
                                    latency_ms = latency.as_millis() as u64,
                                    "Backend attempt succeeded"
                                );
                                return Ok(Served {
                                    value,
                                    entry: Arc::clone(entry),
                                    model,
                                    attempts: attempt,
                                    latency: started.elapsed(),
                                    failover_warning,
                                });
                            }
                            Err(err) => {
                                let class = classify(&err);
                                entry.with_health(|h| {
                                    h.record_failure(&err, latency);
                                    if let LlmError::RateLimited {
                                        retry_after_ms: Some(ms),
                                    } = &err
                                    {
                                        h.set_rate_limited(Some(*ms), self.policy.max_delay);
                                    }
                                });
                                tracing::warn!(
                                    provider = %entry.id,
                                    attempt,
                                    class = %class,
                                    error = %err,
                                    "Backend attempt failed"
                                );

                                if class == FailureClass::Retryable && attempt < max_attempts {
                                    let delay = self.policy.backoff(attempt, &err);
                                    last_error = Some(err);
                                    DispatchState::BackingOff {
                                        idx,
                                        attempt,
                                        delay,
                                    }
                                } else {
                                    failures.push(BackendFailure {
                                        backend: entry.id.clone(),
                                        class,
                                        attempts: attempt,
                                        error: err,
                                    });
                                    DispatchState::NextBackend { idx: idx + 1 }
                                }
                            }
                        }
                    }
                }

                DispatchState::BackingOff {
                    idx,
                    attempt,
                    delay,
                } => {
                    tracing::debug!(
                        provider = %candidates[idx].id,
                        delay_ms = delay.as_millis() as u64,
                        "Backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                    DispatchState::Trying {
                        idx,
                        attempt: attempt + 1,
                    }
                }

                DispatchState::Exhausted => {
                    tracing::error!(
                        failed = failures.len(),
                        skipped = skipped.len(),
                        "All providers failed"
                    );
                    return Err(DispatchError::AllProvidersFailed { failures, skipped });
                }
            };
        }
    }

    async fn is_eligible(&self, entry: &BackendEntry) -> bool {
        if !entry.with_health(|h| h.is_available()) {
            return false;
        }
        if !entry.provider.health_check().await {
            tracing::debug!(provider = %entry.id, "Health check reported unhealthy");
            return false;
        }
        true
    }

    /// Build a failover warning when a non-primary backend serves the request.
    fn build_failover_warning(
        &self,
        primary: &BackendEntry,
        used: &BackendEntry,
        request_model: &str,
    ) -> Option<String> {
        if primary.id == used.id {
            return None;
        }

        let mut parts = vec![format!("Switched to {}", used.id)];

        let pc = primary.provider.capabilities();
        let uc = used.provider.capabilities();
        if uc.max_context_tokens < pc.max_context_tokens
            || uc.max_output_tokens < pc.max_output_tokens
        {
            parts.push("Running on a smaller model -- responses may be less detailed".to_string());
        }

        let model_of = |e: &BackendEntry| -> Option<String> {
            if !request_model.is_empty() {
                return Some(request_model.to_string());
            }
            e.settings.model.clone()
        };
        if let (Some(primary_model), Some(used_model)) = (model_of(primary), model_of(used)) {
            let primary_avg = self.pricing.rates(&primary_model).blended();
            let used_avg = self.pricing.rates(&used_model).blended();
            if primary_avg > 0.0 {
                let ratio = used_avg / primary_avg;
                if ratio > self.policy.cost_warning_multiplier {
                    parts.push(format!(
                        "Note: {} costs ~{ratio:.1}x more than {}",
                        used.id, primary.id
                    ));
                }
            }
        }

        Some(parts.join(". "))
    }
}

/// Fill in the backend's default model when the request leaves it empty.
fn route(entry: &BackendEntry, request: &CompletionRequest) -> CompletionRequest {
    match &entry.settings.model {
        Some(model) if request.model.is_empty() => request.with_model(model),
        _ => request.clone(),
    }
}

/// Open a backend stream and wait for its first content event.
async fn open_stream(
    entry: Arc<BackendEntry>,
    request: CompletionRequest,
    timeout: Duration,
) -> Result<EventStream, LlmError> {
    let mut stream = entry.provider.stream(request);
    let mut buffered: Vec<StreamEvent> = Vec::new();

    let first = tokio::time::timeout(timeout, async {
        while let Some(event) = stream.next().await {
            let event = event?;
            let content = matches!(
                event,
                StreamEvent::TextDelta { .. } | StreamEvent::ToolUseComplete(..) | StreamEvent::Done
            );
            buffered.push(event);
            if content {
                return Ok::<bool, LlmError>(false);
            }
        }
        Ok(true)
    })
    .await;

    let ended = match first {
        Ok(result) => result?,
        Err(_) => {
            return Err(LlmError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            });
        }
    };

    let head = futures_util::stream::iter(buffered.into_iter().map(Ok));
    if ended {
        Ok(Box::pin(head))
    } else {
        Ok(Box::pin(head.chain(stream)))
    }
}
