//! Epoch-aligned budget windows.
//!
//! A window covers one UTC hour or day. Counters only grow within a window;
//! the first access after the boundary rolls the window over to the new
//! aligned start with zeroed counters.

use chrono::{DateTime, TimeDelta, Utc};

use switchyard_types::analytics::{WindowKind, WindowUsage};

fn duration_secs(kind: WindowKind) -> i64 {
    match kind {
        WindowKind::Hour => 3_600,
        WindowKind::Day => 86_400,
    }
}

/// Start of the period containing `now`.
pub fn period_start(kind: WindowKind, now: DateTime<Utc>) -> DateTime<Utc> {
    let duration = duration_secs(kind);
    let start = now.timestamp().div_euclid(duration) * duration;
    DateTime::from_timestamp(start, 0).unwrap_or(now)
}

/// Usage counters for the active period of one window kind.
#[derive(Debug, Clone)]
pub struct BudgetWindow {
    pub kind: WindowKind,
    pub start: DateTime<Utc>,
    pub tokens_used: u64,
    pub cost_used: f64,
    /// Whether the alert threshold has already been reported for this period.
    pub alerted: bool,
}

impl BudgetWindow {
    pub fn new(kind: WindowKind, now: DateTime<Utc>) -> Self {
        Self {
            kind,
            start: period_start(kind, now),
            tokens_used: 0,
            cost_used: 0.0,
            alerted: false,
        }
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + TimeDelta::seconds(duration_secs(self.kind))
    }

    /// Move to the period containing `now` if it is later than this one.
    /// A clock that steps backwards keeps the current period.
    ///
    /// Returns `true` when the window was reset.
    pub fn roll(&mut self, now: DateTime<Utc>) -> bool {
        if period_start(self.kind, now) <= self.start {
            return false;
        }
        tracing::debug!(
            window = self.kind.as_str(),
            tokens_used = self.tokens_used,
            cost_used = self.cost_used,
            "Budget window rolled over"
        );
        *self = Self::new(self.kind, now);
        true
    }

    pub fn add(&mut self, tokens: u64, cost: f64) {
        self.tokens_used = self.tokens_used.saturating_add(tokens);
        self.cost_used += cost.max(0.0);
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::new(self.kind, now);
    }

    pub fn usage(&self, token_limit: u64, cost_limit: Option<f64>) -> WindowUsage {
        WindowUsage {
            kind: self.kind,
            window_start: self.start,
            tokens_used: self.tokens_used,
            token_limit,
            cost_used: self.cost_used,
            cost_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_start_alignment() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 42, 7).unwrap();
        assert_eq!(
            period_start(WindowKind::Hour, now),
            Utc.with_ymd_and_hms(2026, 3, 14, 15, 0, 0).unwrap()
        );
        assert_eq!(
            period_start(WindowKind::Day, now),
            Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_roll_resets_only_after_boundary() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 14, 15, 10, 0).unwrap();
        let mut window = BudgetWindow::new(WindowKind::Hour, t0);
        window.add(500, 0.25);

        assert!(!window.roll(t0 + TimeDelta::minutes(49)));
        assert_eq!(window.tokens_used, 500);

        assert!(window.roll(t0 + TimeDelta::minutes(50)));
        assert_eq!(window.tokens_used, 0);
        assert_eq!(window.cost_used, 0.0);
        assert_eq!(
            window.start,
            Utc.with_ymd_and_hms(2026, 3, 14, 16, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_backwards_clock_step_keeps_usage() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 14, 15, 5, 0).unwrap();
        let mut window = BudgetWindow::new(WindowKind::Hour, t0);
        window.add(700, 0.5);

        assert!(!window.roll(t0 - TimeDelta::minutes(20)));
        assert_eq!(window.tokens_used, 700);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2026, 3, 14, 15, 0, 0).unwrap());

        assert!(window.roll(t0 + TimeDelta::hours(1)));
        assert_eq!(window.tokens_used, 0);
    }

    #[test]
    fn test_add_is_monotonic() {
        let mut window = BudgetWindow::new(WindowKind::Day, Utc::now());
        window.add(10, 0.1);
        window.add(0, -5.0);
        window.add(u64::MAX, 0.0);
        assert_eq!(window.tokens_used, u64::MAX);
        assert!((window.cost_used - 0.1).abs() < 1e-12);
    }
}
