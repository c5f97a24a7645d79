//! Global configuration types for Switchyard.
//!
//! `SwitchyardConfig` represents the top-level `config.toml` that controls
//! budget ceilings, the semantic cache, conversation limits, dispatch policy,
//! the configured backends, and pricing overrides.

use serde::{Deserialize, Serialize};

use crate::llm::ProviderType;

/// Top-level configuration.
///
/// Loaded from `~/.switchyard/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchyardConfig {
    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Backends to register at startup, in any order (priority decides).
    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    /// Pricing overrides, consulted before the built-in table.
    #[serde(default)]
    pub pricing: Vec<ModelPricing>,
}

/// Spend ceilings for the rolling hour/day windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_max_tokens_per_hour")]
    pub max_tokens_per_hour: u64,

    #[serde(default = "default_max_tokens_per_day")]
    pub max_tokens_per_day: u64,

    /// Cost ceiling per hour in USD.
    #[serde(default = "default_max_cost_per_hour")]
    pub max_cost_per_hour: f64,

    /// Optional cost ceiling per day in USD.
    #[serde(default)]
    pub max_cost_per_day: Option<f64>,

    /// Usage ratio at which an alert is raised (never blocks).
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,
}

fn default_max_tokens_per_hour() -> u64 {
    100_000
}

fn default_max_tokens_per_day() -> u64 {
    1_000_000
}

fn default_max_cost_per_hour() -> f64 {
    10.0
}

fn default_alert_threshold() -> f64 {
    0.8
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_hour: default_max_tokens_per_hour(),
            max_tokens_per_day: default_max_tokens_per_day(),
            max_cost_per_hour: default_max_cost_per_hour(),
            max_cost_per_day: None,
            alert_threshold: default_alert_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum cosine similarity for a hit.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_similarity_threshold() -> f32 {
    0.95
}

fn default_max_entries() -> usize {
    1000
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: default_similarity_threshold(),
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Maximum turns kept, system turn included.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Approximate token window for the history.
    #[serde(default = "default_context_window_tokens")]
    pub context_window_tokens: u64,

    /// Collapse old turns into a summary instead of dropping them.
    #[serde(default)]
    pub summarize: bool,

    /// Model used for summaries. Empty means the backend default.
    #[serde(default)]
    pub summary_model: Option<String>,
}

fn default_max_messages() -> usize {
    20
}

fn default_context_window_tokens() -> u64 {
    4000
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            context_window_tokens: default_context_window_tokens(),
            summarize: false,
            summary_model: None,
        }
    }
}

/// Retry, backoff, and circuit breaker policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum attempts per backend.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Per-attempt timeout for backends that do not set their own.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Consecutive failures that open a backend's circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Recent error ratio that opens a backend's circuit.
    #[serde(default = "default_error_ratio_threshold")]
    pub error_ratio_threshold: f64,

    /// Minimum recent outcomes before the error ratio is considered.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Failover cost ratio above which the warning carries a cost note.
    #[serde(default = "default_cost_warning_multiplier")]
    pub cost_warning_multiplier: f64,

    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub default_temperature: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_error_ratio_threshold() -> f64 {
    0.5
}

fn default_min_samples() -> usize {
    5
}

fn default_cooldown_secs() -> u64 {
    30
}

fn default_cost_warning_multiplier() -> f64 {
    3.0
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            default_timeout_ms: default_timeout_ms(),
            failure_threshold: default_failure_threshold(),
            error_ratio_threshold: default_error_ratio_threshold(),
            min_samples: default_min_samples(),
            cooldown_secs: default_cooldown_secs(),
            cost_warning_multiplier: default_cost_warning_multiplier(),
            default_max_tokens: default_max_tokens(),
            default_temperature: default_temperature(),
        }
    }
}

/// One configured backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Registry identifier (e.g., "deepseek").
    pub name: String,

    pub provider_type: ProviderType,

    /// Endpoint base URL. Defaults per provider type when omitted.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,

    pub model: String,

    /// Lower is tried first.
    #[serde(default)]
    pub priority: u32,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Cost information for a model pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Model name prefix, with an optional trailing `*` (e.g., "deepseek-*").
    pub model_pattern: String,
    /// Cost per million input tokens in USD.
    pub input_cost_per_million: f64,
    /// Cost per million output tokens in USD.
    pub output_cost_per_million: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = SwitchyardConfig::default();
        assert_eq!(config.budget.max_tokens_per_hour, 100_000);
        assert_eq!(config.budget.max_tokens_per_day, 1_000_000);
        assert!(config.budget.max_cost_per_day.is_none());
        assert!((config.cache.similarity_threshold - 0.95).abs() < f32::EPSILON);
        assert_eq!(config.conversation.max_messages, 20);
        assert_eq!(config.dispatch.max_retries, 3);
        assert!(config.backends.is_empty());
        assert!(config.pricing.is_empty());
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: SwitchyardConfig = toml::from_str("").unwrap();
        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.dispatch.cooldown_secs, 30);
    }

    #[test]
    fn test_config_deserialize_with_values() {
        let toml_str = r#"
[budget]
max_tokens_per_hour = 5000
max_cost_per_day = 2.5

[cache]
enabled = false

[[backends]]
name = "deepseek"
provider_type = "openai_compatible"
base_url = "https://api.deepseek.com/v1"
api_key_env = "DEEPSEEK_API_KEY"
model = "deepseek-chat"
priority = 0

[[backends]]
name = "offline"
provider_type = "local"
model = "local"
priority = 9

[[pricing]]
model_pattern = "deepseek-*"
input_cost_per_million = 0.14
output_cost_per_million = 0.28
"#;
        let config: SwitchyardConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.budget.max_tokens_per_hour, 5000);
        assert_eq!(config.budget.max_tokens_per_day, 1_000_000);
        assert_eq!(config.budget.max_cost_per_day, Some(2.5));
        assert!(!config.cache.enabled);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].provider_type, ProviderType::OpenAiCompatible);
        assert!(config.backends[1].enabled);
        assert!(config.backends[1].base_url.is_none());
        assert_eq!(config.pricing[0].model_pattern, "deepseek-*");
    }
}
