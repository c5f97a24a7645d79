//! `swyd providers`: the configured fallback chain and its connectivity.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;

use switchyard_infra::llm::test_provider_connection;
use switchyard_types::config::BackendConfig;

use super::chat::Output;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ProviderRow {
    name: String,
    provider_type: String,
    model: String,
    priority: u32,
    enabled: bool,
    /// Built and registered (key present, config valid).
    registered: bool,
    /// "ok" or the error, when tested.
    #[serde(skip_serializing_if = "Option::is_none")]
    connection: Option<String>,
}

pub async fn list_providers(state: &AppState, test: bool, out: Output) -> Result<()> {
    let mut configs: Vec<&BackendConfig> = state.orchestrator.config().backends.iter().collect();
    configs.sort_by_key(|c| c.priority);

    let registry = state.orchestrator.registry();
    let mut rows = Vec::with_capacity(configs.len());
    for config in configs {
        let entry = registry.get(&config.name);
        let connection = match (&entry, test) {
            (Some(entry), true) => Some(match test_provider_connection(&entry.provider).await {
                Ok(()) => "ok".to_string(),
                Err(e) => e.to_string(),
            }),
            _ => None,
        };
        rows.push(ProviderRow {
            name: config.name.clone(),
            provider_type: config.provider_type.to_string(),
            model: config.model.clone(),
            priority: config.priority,
            enabled: config.enabled,
            registered: entry.is_some(),
            connection,
        });
    }

    if out.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!();
        println!(
            "  {} No backends configured. Add a {} entry to {}.",
            style("i").blue().bold(),
            style("[[backends]]").cyan(),
            state.config_path.display()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("  {}", style("Fallback Chain Order").bold());
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![
        Cell::new("Priority").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ];
    if test {
        header.push(Cell::new("Connection").fg(Color::White));
    }
    table.set_header(header);

    for row in &rows {
        let status = match (row.enabled, row.registered) {
            (false, _) => Cell::new("disabled").fg(Color::DarkGrey),
            (true, true) => Cell::new("ready").fg(Color::Green),
            (true, false) => Cell::new("unavailable").fg(Color::Red),
        };
        let mut cells = vec![
            Cell::new(row.priority).fg(Color::Cyan),
            Cell::new(&row.name).fg(Color::White),
            Cell::new(&row.provider_type).fg(Color::DarkGrey),
            Cell::new(&row.model).fg(Color::DarkGrey),
            status,
        ];
        if test {
            cells.push(match row.connection.as_deref() {
                Some("ok") => Cell::new("ok").fg(Color::Green),
                Some(e) => Cell::new(e).fg(Color::Red),
                None => Cell::new("-").fg(Color::DarkGrey),
            });
        }
        table.add_row(cells);
    }

    println!("{table}");
    println!();
    println!(
        "  {} backend{} configured, {} ready",
        style(rows.len()).bold(),
        if rows.len() == 1 { "" } else { "s" },
        rows.iter().filter(|r| r.registered).count()
    );
    println!();

    Ok(())
}
