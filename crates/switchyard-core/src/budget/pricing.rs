//! Cost estimation and pricing for backend models.
//!
//! A built-in default table for known models with user overrides from
//! `config.toml`. Cost estimates are labeled as approximate (`~$0.12`).

use switchyard_types::config::ModelPricing;

/// Per-million-token rates in USD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rates {
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
}

impl Rates {
    /// Mean of input and output rates, used to compare models.
    pub fn blended(&self) -> f64 {
        (self.input_cost_per_million + self.output_cost_per_million) / 2.0
    }
}

struct PricingEntry {
    model_pattern: &'static str,
    input_cost_per_million: f64,
    output_cost_per_million: f64,
}

/// Conservative fallback pricing when no model match is found.
const FALLBACK_RATES: Rates = Rates {
    input_cost_per_million: 5.0,
    output_cost_per_million: 15.0,
};

/// More specific prefixes come first: `gpt-4o-mini` before `gpt-4o` before `gpt-4`.
const DEFAULT_PRICING: &[PricingEntry] = &[
    // DeepSeek
    PricingEntry {
        model_pattern: "deepseek-chat",
        input_cost_per_million: 0.14,
        output_cost_per_million: 0.28,
    },
    PricingEntry {
        model_pattern: "deepseek-reasoner",
        input_cost_per_million: 0.55,
        output_cost_per_million: 2.19,
    },
    // OpenAI
    PricingEntry {
        model_pattern: "gpt-4o-mini",
        input_cost_per_million: 0.15,
        output_cost_per_million: 0.60,
    },
    PricingEntry {
        model_pattern: "gpt-4o",
        input_cost_per_million: 2.50,
        output_cost_per_million: 10.0,
    },
    PricingEntry {
        model_pattern: "gpt-4",
        input_cost_per_million: 30.0,
        output_cost_per_million: 60.0,
    },
    PricingEntry {
        model_pattern: "gpt-3.5-turbo",
        input_cost_per_million: 0.50,
        output_cost_per_million: 1.50,
    },
    // Anthropic
    PricingEntry {
        model_pattern: "claude-sonnet-4",
        input_cost_per_million: 3.0,
        output_cost_per_million: 15.0,
    },
    PricingEntry {
        model_pattern: "claude-opus-4",
        input_cost_per_million: 15.0,
        output_cost_per_million: 75.0,
    },
    PricingEntry {
        model_pattern: "claude-haiku",
        input_cost_per_million: 0.25,
        output_cost_per_million: 1.25,
    },
    // Mistral
    PricingEntry {
        model_pattern: "mistral-large",
        input_cost_per_million: 2.0,
        output_cost_per_million: 6.0,
    },
    PricingEntry {
        model_pattern: "mistral-small",
        input_cost_per_million: 0.2,
        output_cost_per_million: 0.6,
    },
    // Offline fallback backend
    PricingEntry {
        model_pattern: "local",
        input_cost_per_million: 0.0,
        output_cost_per_million: 0.0,
    },
];

/// Simple prefix matching. A trailing `*` in the pattern is ignored:
/// `"deepseek-*"` and `"deepseek-"` both match `"deepseek-chat"`.
fn matches_pattern(model: &str, pattern: &str) -> bool {
    model.starts_with(pattern.trim_end_matches('*'))
}

/// Model price lookup.
///
/// Lookup order:
/// 1. User-defined pricing overrides from `config.toml`
/// 2. Built-in default pricing table
/// 3. Conservative fallback ($5.00 / $15.00 per million tokens)
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    overrides: Vec<ModelPricing>,
}

impl PriceTable {
    pub fn new(overrides: Vec<ModelPricing>) -> Self {
        Self { overrides }
    }

    pub fn rates(&self, model: &str) -> Rates {
        if let Some(p) = self
            .overrides
            .iter()
            .find(|p| matches_pattern(model, &p.model_pattern))
        {
            return Rates {
                input_cost_per_million: p.input_cost_per_million,
                output_cost_per_million: p.output_cost_per_million,
            };
        }

        DEFAULT_PRICING
            .iter()
            .find(|e| matches_pattern(model, e.model_pattern))
            .map(|e| Rates {
                input_cost_per_million: e.input_cost_per_million,
                output_cost_per_million: e.output_cost_per_million,
            })
            .unwrap_or(FALLBACK_RATES)
    }

    /// Estimate the cost of a request in USD.
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64, model: &str) -> f64 {
        let rates = self.rates(model);
        compute_cost(input_tokens, output_tokens, &rates)
    }
}

fn compute_cost(input_tokens: u64, output_tokens: u64, rates: &Rates) -> f64 {
    let input_cost = (input_tokens as f64 / 1_000_000.0) * rates.input_cost_per_million;
    let output_cost = (output_tokens as f64 / 1_000_000.0) * rates.output_cost_per_million;
    input_cost + output_cost
}

/// Format a cost estimate as a human-readable string.
///
/// Always prefixed with `~` to indicate the value is an estimate.
/// - Costs below $0.01 use 3 decimal places: `~$0.001`
/// - Costs $0.01 and above use 2 decimal places: `~$0.12`
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("~${cost:.3}")
    } else {
        format!("~${cost:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_cost_known_model_returns_correct_value() {
        let table = PriceTable::default();
        let cost = table.estimate_cost(1_000_000, 100_000, "claude-sonnet-4-20250514");
        // $3.00 + $1.50
        assert!((cost - 4.50).abs() < 0.001, "Expected ~$4.50, got ${cost}");
    }

    #[test]
    fn estimate_cost_user_override_takes_priority() {
        let table = PriceTable::new(vec![ModelPricing {
            model_pattern: "deepseek-*".to_string(),
            input_cost_per_million: 1.0,
            output_cost_per_million: 5.0,
        }]);
        let cost = table.estimate_cost(1_000_000, 100_000, "deepseek-chat");
        assert!((cost - 1.50).abs() < 0.001, "Expected ~$1.50, got ${cost}");
    }

    #[test]
    fn estimate_cost_unknown_model_uses_fallback() {
        let table = PriceTable::default();
        let cost = table.estimate_cost(1_000_000, 100_000, "some-unknown-model");
        assert!((cost - 6.50).abs() < 0.001, "Expected ~$6.50, got ${cost}");
    }

    #[test]
    fn gpt4_variants_match_most_specific_prefix() {
        let table = PriceTable::default();
        assert!((table.rates("gpt-4o-mini-2024").input_cost_per_million - 0.15).abs() < 1e-9);
        assert!((table.rates("gpt-4o-2024-08-06").input_cost_per_million - 2.50).abs() < 1e-9);
        assert!((table.rates("gpt-4").input_cost_per_million - 30.0).abs() < 1e-9);
    }

    #[test]
    fn deepseek_is_cheap() {
        let table = PriceTable::default();
        let cost = table.estimate_cost(0, 1_000_000, "deepseek-chat");
        assert!((cost - 0.28).abs() < 1e-9);
    }

    #[test]
    fn format_cost_small_amounts_three_decimal_places() {
        assert_eq!(format_cost(0.001), "~$0.001");
        assert_eq!(format_cost(0.0054), "~$0.005");
        assert_eq!(format_cost(0.0), "~$0.000");
    }

    #[test]
    fn format_cost_normal_amounts_two_decimal_places() {
        assert_eq!(format_cost(0.12), "~$0.12");
        assert_eq!(format_cost(4.50), "~$4.50");
    }
}
