//! Backend health tracking for the dispatcher.
//!
//! A circuit breaker per backend, tripped either by consecutive failures or
//! by the error ratio over a sliding window of recent outcomes. Instants come
//! from `tokio::time` so cooldowns follow the runtime clock.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use switchyard_types::analytics::BackendStats;
use switchyard_types::config::DispatchConfig;
use switchyard_types::llm::LlmError;

/// Number of recent outcomes kept for the error-ratio trip.
pub const RECENT_WINDOW: usize = 20;

/// Circuit breaker state for a backend.
#[derive(Debug, Clone)]
pub enum CircuitState {
    /// Normal operation. Tracks consecutive failures toward threshold.
    Closed { consecutive_failures: u32 },
    /// Backend is skipped until `wait_duration` elapses.
    Open {
        opened_at: Instant,
        wait_duration: Duration,
    },
    /// Probing: the next call decides whether the circuit closes again.
    HalfOpen,
}

impl CircuitState {
    pub fn label(&self) -> &'static str {
        match self {
            CircuitState::Closed { .. } => "closed",
            CircuitState::Open { .. } => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Thresholds for tripping the breaker.
#[derive(Debug, Clone)]
pub struct HealthPolicy {
    pub failure_threshold: u32,
    pub error_ratio_threshold: f64,
    pub min_samples: usize,
    pub open_duration: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            error_ratio_threshold: 0.5,
            min_samples: 5,
            open_duration: Duration::from_secs(30),
        }
    }
}

impl From<&DispatchConfig> for HealthPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            error_ratio_threshold: config.error_ratio_threshold,
            min_samples: config.min_samples.max(1),
            open_duration: Duration::from_secs(config.cooldown_secs),
        }
    }
}

/// Health and liveness stats for a single backend.
#[derive(Debug)]
pub struct ProviderHealth {
    pub state: CircuitState,
    pub policy: HealthPolicy,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_latency: Option<Duration>,
    pub total_calls: u64,
    pub total_failures: u64,
    /// If rate-limited, don't use until this instant.
    pub rate_limit_until: Option<Instant>,
    /// `true` = success, most recent last.
    recent: VecDeque<bool>,
}

impl ProviderHealth {
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            state: CircuitState::Closed {
                consecutive_failures: 0,
            },
            policy,
            last_error: None,
            last_error_at: None,
            last_latency: None,
            total_calls: 0,
            total_failures: 0,
            rate_limit_until: None,
            recent: VecDeque::with_capacity(RECENT_WINDOW),
        }
    }

    /// Check whether this backend may be attempted.
    ///
    /// Handles rate-limit cooldown and circuit state transitions
    /// (Open -> HalfOpen when the wait duration has elapsed).
    pub fn is_available(&mut self) -> bool {
        if let Some(until) = self.rate_limit_until {
            if Instant::now() < until {
                return false;
            }
            self.rate_limit_until = None;
        }

        match &self.state {
            CircuitState::Closed { .. } | CircuitState::HalfOpen => true,
            CircuitState::Open {
                opened_at,
                wait_duration,
            } => {
                if opened_at.elapsed() >= *wait_duration {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self, latency: Duration) {
        self.total_calls += 1;
        self.last_latency = Some(latency);
        self.push_outcome(true);
        self.state = CircuitState::Closed {
            consecutive_failures: 0,
        };
    }

    pub fn record_failure(&mut self, error: &LlmError, latency: Duration) {
        self.total_calls += 1;
        self.total_failures += 1;
        self.last_error = Some(error.to_string());
        self.last_error_at = Some(Utc::now());
        self.last_latency = Some(latency);
        self.push_outcome(false);

        match &self.state {
            CircuitState::Closed {
                consecutive_failures,
            } => {
                let new_count = consecutive_failures + 1;
                if new_count >= self.policy.failure_threshold || self.error_ratio_tripped() {
                    self.open();
                } else {
                    self.state = CircuitState::Closed {
                        consecutive_failures: new_count,
                    };
                }
            }
            // Probe failed
            CircuitState::HalfOpen => self.open(),
            CircuitState::Open { .. } => {}
        }
    }

    /// Mark this backend as rate-limited for the hinted duration, capped at `max_wait`.
    pub fn set_rate_limited(&mut self, retry_after_ms: Option<u64>, max_wait: Duration) {
        let wait = retry_after_ms
            .map(Duration::from_millis)
            .unwrap_or(max_wait)
            .min(max_wait);
        self.rate_limit_until = Some(Instant::now() + wait);
    }

    /// Error ratio over the recent outcome window (0.0 when empty).
    pub fn recent_error_ratio(&self) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        let failures = self.recent.iter().filter(|ok| !**ok).count();
        failures as f64 / self.recent.len() as f64
    }

    pub fn consecutive_failures(&self) -> u32 {
        match &self.state {
            CircuitState::Closed {
                consecutive_failures,
            } => *consecutive_failures,
            _ => 0,
        }
    }

    /// Convert to a `BackendStats` row for analytics and CLI display.
    pub fn to_stats(&self, name: &str, priority: u32, model: Option<&str>) -> BackendStats {
        let available = match &self.state {
            CircuitState::Open {
                opened_at,
                wait_duration,
            } => opened_at.elapsed() >= *wait_duration,
            _ => true,
        } && self.rate_limit_until.is_none_or(|until| Instant::now() >= until);

        BackendStats {
            name: name.to_string(),
            priority,
            model: model.map(str::to_string),
            circuit_state: self.state.label().to_string(),
            total_calls: self.total_calls,
            total_failures: self.total_failures,
            consecutive_failures: self.consecutive_failures(),
            last_error: self.last_error.clone(),
            last_error_at: self.last_error_at,
            last_latency: self.last_latency,
            available,
        }
    }

    fn open(&mut self) {
        self.state = CircuitState::Open {
            opened_at: Instant::now(),
            wait_duration: self.policy.open_duration,
        };
    }

    fn error_ratio_tripped(&self) -> bool {
        self.recent.len() >= self.policy.min_samples
            && self.recent_error_ratio() >= self.policy.error_ratio_threshold
    }

    fn push_outcome(&mut self, ok: bool) {
        if self.recent.len() == RECENT_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(ok);
    }
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self::new(HealthPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_error() -> LlmError {
        LlmError::Provider {
            message: "503".to_string(),
        }
    }

    const MS: Duration = Duration::from_millis(10);

    #[test]
    fn test_new_provider_health_defaults() {
        let health = ProviderHealth::default();
        assert_eq!(health.policy.failure_threshold, 3);
        assert_eq!(health.policy.open_duration, Duration::from_secs(30));
        assert!(matches!(
            health.state,
            CircuitState::Closed {
                consecutive_failures: 0
            }
        ));
    }

    #[tokio::test]
    async fn test_circuit_opens_after_threshold_failures() {
        let mut health = ProviderHealth::default();
        health.record_failure(&provider_error(), MS);
        health.record_failure(&provider_error(), MS);
        assert!(health.is_available());

        health.record_failure(&provider_error(), MS);
        assert!(!health.is_available());
        assert!(matches!(health.state, CircuitState::Open { .. }));
        assert_eq!(health.total_failures, 3);
        assert!(health.last_error_at.is_some());
    }

    #[tokio::test]
    async fn test_circuit_opens_on_error_ratio() {
        let mut health = ProviderHealth::default();
        // Alternate so consecutive failures never reach 3.
        for _ in 0..2 {
            health.record_success(MS);
            health.record_failure(&provider_error(), MS);
        }
        assert!(health.is_available());
        // 5th sample: 3 failures out of 5 = 0.6 >= 0.5
        health.record_failure(&provider_error(), MS);
        assert!(matches!(health.state, CircuitState::Open { .. }));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let mut health = ProviderHealth::default();
        health.record_failure(&provider_error(), MS);
        health.record_failure(&provider_error(), MS);
        health.record_success(MS);
        assert_eq!(health.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_half_opens_after_cooldown() {
        let mut health = ProviderHealth::default();
        for _ in 0..3 {
            health.record_failure(&provider_error(), MS);
        }
        assert!(!health.is_available());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(health.is_available());
        assert!(matches!(health.state, CircuitState::HalfOpen));

        // Failed probe reopens immediately.
        health.record_failure(&provider_error(), MS);
        assert!(!health.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_blocks_availability() {
        let mut health = ProviderHealth::default();
        health.set_rate_limited(Some(5000), Duration::from_secs(10));
        assert!(!health.is_available());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(health.is_available());
    }

    #[tokio::test]
    async fn test_recent_window_is_bounded() {
        let mut health = ProviderHealth::new(HealthPolicy {
            failure_threshold: 100,
            error_ratio_threshold: 1.1,
            ..HealthPolicy::default()
        });
        for _ in 0..RECENT_WINDOW {
            health.record_failure(&provider_error(), MS);
        }
        for _ in 0..RECENT_WINDOW {
            health.record_success(MS);
        }
        assert_eq!(health.recent_error_ratio(), 0.0);
    }

    #[tokio::test]
    async fn test_to_stats() {
        let mut health = ProviderHealth::default();
        health.record_success(Duration::from_millis(120));
        let stats = health.to_stats("deepseek", 0, Some("deepseek-chat"));
        assert_eq!(stats.name, "deepseek");
        assert_eq!(stats.circuit_state, "closed");
        assert_eq!(stats.total_calls, 1);
        assert_eq!(stats.last_latency, Some(Duration::from_millis(120)));
        assert!(stats.available);
    }
}
