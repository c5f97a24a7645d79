//! Analytics rendering for the interactive session.
//!
//! Colors change at the budget alert threshold to flag consumption early.

use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use switchyard_types::analytics::{Analytics, BackendStats, WindowUsage};

/// Format a token count with thousands separators (e.g., 12,450).
pub fn format_tokens(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `hour: 12,450 / 100,000 tokens · $0.0123 / $10.00`
pub fn render_window(window: &WindowUsage, alert_threshold: f64) -> String {
    let cost = match window.cost_limit {
        Some(limit) => format!("${:.4} / ${limit:.2}", window.cost_used),
        None => format!("${:.4}", window.cost_used),
    };
    let text = format!(
        "{:>4}: {} / {} tokens · {cost}",
        window.kind.as_str(),
        format_tokens(window.tokens_used),
        format_tokens(window.token_limit),
    );

    let ratio = window.max_ratio();
    if ratio >= 1.0 {
        format!("{}", style(text).red())
    } else if ratio >= alert_threshold {
        format!("{}", style(text).yellow())
    } else {
        format!("{}", style(text).dim())
    }
}

fn circuit_cell(backend: &BackendStats) -> Cell {
    let color = match backend.circuit_state.as_str() {
        "closed" => Color::Green,
        "half_open" => Color::Yellow,
        _ => Color::Red,
    };
    Cell::new(&backend.circuit_state).fg(color)
}

pub fn backends_table(backends: &[BackendStats]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Priority").fg(Color::White),
        Cell::new("Backend").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Circuit").fg(Color::White),
        Cell::new("Calls").fg(Color::White),
        Cell::new("Failures").fg(Color::White),
        Cell::new("Latency").fg(Color::White),
    ]);

    for backend in backends {
        let latency = backend
            .last_latency
            .map(|d| format!("{}ms", d.as_millis()))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(backend.priority).fg(Color::Cyan),
            Cell::new(&backend.name),
            Cell::new(backend.model.as_deref().unwrap_or("-")).fg(Color::DarkGrey),
            circuit_cell(backend),
            Cell::new(backend.total_calls),
            Cell::new(backend.total_failures).fg(if backend.total_failures > 0 {
                Color::Yellow
            } else {
                Color::DarkGrey
            }),
            Cell::new(latency).fg(Color::DarkGrey),
        ]);
    }
    table
}

/// Multi-line analytics block for `/stats`.
pub fn render_analytics(analytics: &Analytics) -> String {
    let budget = &analytics.budget;
    let cache = &analytics.cache;
    let conv = &analytics.conversation;
    let req = &analytics.requests;

    let mut lines = vec![
        format!("  {}", style("Budget").bold()),
        format!("    {}", render_window(&budget.hour, budget.alert_threshold)),
        format!("    {}", render_window(&budget.day, budget.alert_threshold)),
        String::new(),
        format!("  {}", style("Cache").bold()),
    ];
    if cache.enabled {
        lines.push(format!(
            "    {} entries · {} hits · {} misses · {:.0}% hit rate · {} evicted",
            cache.size,
            cache.hits,
            cache.misses,
            cache.hit_rate() * 100.0,
            cache.evictions
        ));
    } else {
        lines.push(format!("    {}", style("disabled").dim()));
    }
    lines.extend([
        String::new(),
        format!("  {}", style("Conversation").bold()),
        format!(
            "    {} messages · ~{} tokens · {} summaries",
            conv.message_count,
            format_tokens(conv.token_count),
            conv.summaries
        ),
        String::new(),
        format!("  {}", style("Requests").bold()),
        format!(
            "    {} total · {} cached · {} dispatched · {} failed · {} denied",
            req.total, req.cache_hits, req.dispatched, req.failed, req.denied
        ),
        String::new(),
        backends_table(&analytics.backends).to_string(),
    ]);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use switchyard_types::analytics::WindowKind;

    fn window(tokens_used: u64) -> WindowUsage {
        WindowUsage {
            kind: WindowKind::Hour,
            window_start: Utc::now(),
            tokens_used,
            token_limit: 100_000,
            cost_used: 0.0,
            cost_limit: Some(10.0),
        }
    }

    #[test]
    fn test_format_tokens() {
        assert_eq!(format_tokens(0), "0");
        assert_eq!(format_tokens(999), "999");
        assert_eq!(format_tokens(12_450), "12,450");
        assert_eq!(format_tokens(1_000_000), "1,000,000");
    }

    #[test]
    fn test_render_window_contains_counts() {
        console::set_colors_enabled(false);
        let text = render_window(&window(12_450), 0.8);
        assert!(text.contains("hour: 12,450 / 100,000 tokens"));
        assert!(text.contains("$0.0000 / $10.00"));
    }

    #[test]
    fn test_backends_table_lists_each_backend() {
        let backends = vec![BackendStats {
            name: "deepseek".into(),
            priority: 0,
            model: Some("deepseek-chat".into()),
            circuit_state: "open".into(),
            total_calls: 4,
            total_failures: 3,
            consecutive_failures: 3,
            last_error: Some("timeout".into()),
            last_error_at: None,
            last_latency: None,
            available: false,
        }];
        let rendered = backends_table(&backends).to_string();
        assert!(rendered.contains("deepseek-chat"));
        assert!(rendered.contains("open"));
    }
}
