//! Spend control over rolling hour/day windows.
//!
//! `BudgetController` gates dispatch: `admit` checks a request's estimated
//! tokens and cost against every ceiling before any backend is called, and
//! `record` commits actual usage afterwards. Alerts at the configured
//! threshold are logged once per window and never block.

pub mod pricing;
pub mod window;

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use switchyard_types::analytics::{BudgetSnapshot, WindowKind};
use switchyard_types::config::BudgetConfig;
use switchyard_types::error::DenialReason;
use switchyard_types::llm::Usage;

use self::pricing::PriceTable;
use self::window::BudgetWindow;

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Allowed,
    Denied(DenialReason),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Status returned after recording usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    /// Below the alert threshold, or the alert was already reported.
    Ok,
    /// A window just crossed the alert threshold. Returned once per window.
    Warning,
}

#[derive(Debug)]
struct BudgetState {
    hour: BudgetWindow,
    day: BudgetWindow,
}

impl BudgetState {
    fn roll(&mut self, now: DateTime<Utc>) {
        self.hour.roll(now);
        self.day.roll(now);
    }
}

#[derive(Debug)]
pub struct BudgetController {
    config: BudgetConfig,
    pricing: Arc<PriceTable>,
    state: Mutex<BudgetState>,
}

impl BudgetController {
    pub fn new(config: BudgetConfig, pricing: Arc<PriceTable>) -> Self {
        let now = Utc::now();
        Self {
            config,
            pricing,
            state: Mutex::new(BudgetState {
                hour: BudgetWindow::new(WindowKind::Hour, now),
                day: BudgetWindow::new(WindowKind::Day, now),
            }),
        }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Check whether a request estimated at `estimated_tokens` fits every ceiling.
    ///
    /// The estimate is priced at the model's output rate. Projected usage
    /// exactly at a ceiling is allowed.
    pub fn admit(&self, estimated_tokens: u64, model: &str) -> Admission {
        self.admit_at(estimated_tokens, model, Utc::now())
    }

    fn admit_at(&self, estimated_tokens: u64, model: &str, now: DateTime<Utc>) -> Admission {
        let estimated_cost = self.pricing.estimate_cost(0, estimated_tokens, model);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.roll(now);

        let hour_tokens = state.hour.tokens_used.saturating_add(estimated_tokens);
        let day_tokens = state.day.tokens_used.saturating_add(estimated_tokens);
        let hour_cost = state.hour.cost_used + estimated_cost;
        let day_cost = state.day.cost_used + estimated_cost;

        let denial = if hour_tokens > self.config.max_tokens_per_hour {
            Some(DenialReason::HourlyTokens {
                projected: hour_tokens,
                limit: self.config.max_tokens_per_hour,
            })
        } else if day_tokens > self.config.max_tokens_per_day {
            Some(DenialReason::DailyTokens {
                projected: day_tokens,
                limit: self.config.max_tokens_per_day,
            })
        } else if hour_cost > self.config.max_cost_per_hour {
            Some(DenialReason::HourlyCost {
                projected: hour_cost,
                limit: self.config.max_cost_per_hour,
            })
        } else {
            self.config
                .max_cost_per_day
                .filter(|limit| day_cost > *limit)
                .map(|limit| DenialReason::DailyCost {
                    projected: day_cost,
                    limit,
                })
        };

        match denial {
            Some(reason) => {
                tracing::warn!(%reason, estimated_tokens, model, "Budget admission denied");
                Admission::Denied(reason)
            }
            None => Admission::Allowed,
        }
    }

    /// Commit actual usage to both windows. Never fails.
    pub fn record(&self, usage: &Usage, model: &str) -> BudgetStatus {
        self.record_at(usage, model, Utc::now())
    }

    fn record_at(&self, usage: &Usage, model: &str, now: DateTime<Utc>) -> BudgetStatus {
        let cost = self.pricing.estimate_cost(
            u64::from(usage.input_tokens),
            u64::from(usage.output_tokens),
            model,
        );
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;
        state.roll(now);

        let tokens = usage.total();
        state.hour.add(tokens, cost);
        state.day.add(tokens, cost);

        let mut status = BudgetStatus::Ok;
        let hour_limit = Some(self.config.max_cost_per_hour);
        let day_limit = self.config.max_cost_per_day;
        for (window, token_limit, cost_limit) in [
            (&mut state.hour, self.config.max_tokens_per_hour, hour_limit),
            (&mut state.day, self.config.max_tokens_per_day, day_limit),
        ] {
            let ratio = window.usage(token_limit, cost_limit).max_ratio();
            if ratio >= self.config.alert_threshold && !window.alerted {
                window.alerted = true;
                status = BudgetStatus::Warning;
                tracing::warn!(
                    window = window.kind.as_str(),
                    tokens_used = window.tokens_used,
                    cost_used = window.cost_used,
                    percent = format!("{:.0}", ratio * 100.0),
                    "Budget alert threshold reached"
                );
            }
        }
        status
    }

    /// Both windows with limits, ratios, and the alert flag.
    pub fn current_usage(&self) -> BudgetSnapshot {
        self.current_usage_at(Utc::now())
    }

    fn current_usage_at(&self, now: DateTime<Utc>) -> BudgetSnapshot {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.roll(now);

        let hour = state
            .hour
            .usage(self.config.max_tokens_per_hour, Some(self.config.max_cost_per_hour));
        let day = state
            .day
            .usage(self.config.max_tokens_per_day, self.config.max_cost_per_day);
        let alert = hour.max_ratio() >= self.config.alert_threshold
            || day.max_ratio() >= self.config.alert_threshold;

        BudgetSnapshot {
            hour,
            day,
            alert_threshold: self.config.alert_threshold,
            alert,
        }
    }

    /// Zero both windows.
    pub fn reset(&self) {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.hour.reset(now);
        state.day.reset(now);
        tracing::info!("Budget windows reset");
    }
}
