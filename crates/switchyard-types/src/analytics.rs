//! Point-in-time analytics snapshots.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Budget window granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Hour,
    Day,
}

impl WindowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Hour => "hour",
            WindowKind::Day => "day",
        }
    }
}

/// Usage of one budget window against its ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowUsage {
    pub kind: WindowKind,
    pub window_start: DateTime<Utc>,
    pub tokens_used: u64,
    pub token_limit: u64,
    pub cost_used: f64,
    pub cost_limit: Option<f64>,
}

impl WindowUsage {
    pub fn token_ratio(&self) -> f64 {
        if self.token_limit == 0 {
            return 0.0;
        }
        self.tokens_used as f64 / self.token_limit as f64
    }

    pub fn cost_ratio(&self) -> f64 {
        match self.cost_limit {
            Some(limit) if limit > 0.0 => self.cost_used / limit,
            _ => 0.0,
        }
    }

    /// Highest of the token and cost ratios.
    pub fn max_ratio(&self) -> f64 {
        self.token_ratio().max(self.cost_ratio())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub hour: WindowUsage,
    pub day: WindowUsage,
    pub alert_threshold: f64,
    /// Any ratio at or above the alert threshold.
    pub alert: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationStats {
    pub message_count: usize,
    pub token_count: u64,
    pub summaries: u64,
}

/// Liveness view of one registered backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendStats {
    pub name: String,
    pub priority: u32,
    pub model: Option<String>,
    /// "closed", "open", or "half_open".
    pub circuit_state: String,
    pub total_calls: u64,
    pub total_failures: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    #[serde(with = "duration_ms_opt")]
    pub last_latency: Option<Duration>,
    pub available: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestStats {
    pub total: u64,
    pub cache_hits: u64,
    pub dispatched: u64,
    pub failed: u64,
    pub denied: u64,
}

/// Everything `Orchestrator::analytics` reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analytics {
    pub budget: BudgetSnapshot,
    pub cache: CacheStats,
    pub conversation: ConversationStats,
    pub backends: Vec<BackendStats>,
    pub requests: RequestStats,
}

mod duration_ms_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
