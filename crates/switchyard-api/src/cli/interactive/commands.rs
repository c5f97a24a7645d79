//! Slash command parsing for the interactive session.
//!
//! Commands start with `/`; anything else is a prompt.

use console::style;

#[derive(Debug, PartialEq)]
pub enum ReplCommand {
    Help,
    Exit,
    /// Clear conversation history, keeping the system prompt.
    Reset,
    /// Replace the system prompt.
    System(String),
    /// Show analytics.
    Stats,
    /// Show the last N turns.
    History(usize),
    /// Switch to a named session (`/session` alone returns to the default).
    Session(Option<String>),
    ClearCache,
    ResetBudget,
    /// Toggle streaming output.
    Stream,
    Unknown(String),
}

const DEFAULT_HISTORY: usize = 10;

/// Parse user input as a slash command. `None` if it is a prompt.
pub fn parse(input: &str) -> Option<ReplCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(' ') {
        Some((cmd, arg)) => (cmd.to_lowercase(), Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (trimmed.to_lowercase(), None),
    };

    Some(match cmd.as_str() {
        "/help" | "/h" | "/?" => ReplCommand::Help,
        "/exit" | "/quit" | "/q" => ReplCommand::Exit,
        "/reset" | "/new" => ReplCommand::Reset,
        "/system" => match arg {
            Some(text) => ReplCommand::System(text.to_string()),
            None => ReplCommand::Unknown("/system requires a prompt".to_string()),
        },
        "/stats" | "/analytics" => ReplCommand::Stats,
        "/history" => match arg.map(str::parse::<usize>) {
            None => ReplCommand::History(DEFAULT_HISTORY),
            Some(Ok(n)) => ReplCommand::History(n),
            Some(Err(_)) => ReplCommand::Unknown("/history takes a number".to_string()),
        },
        "/session" => ReplCommand::Session(arg.map(str::to_string)),
        "/clear-cache" => ReplCommand::ClearCache,
        "/reset-budget" => ReplCommand::ResetBudget,
        "/stream" => ReplCommand::Stream,
        other => ReplCommand::Unknown(other.to_string()),
    })
}

pub fn render_help() -> String {
    let rows = [
        ("/help", "Show this help"),
        ("/system <text>", "Replace the system prompt"),
        ("/reset", "Clear history (keeps the system prompt)"),
        ("/history [n]", "Show the last n turns"),
        ("/session [name]", "Switch session (no name: default)"),
        ("/stats", "Budget, cache, conversation, and backend analytics"),
        ("/stream", "Toggle streaming output"),
        ("/clear-cache", "Drop every cached response"),
        ("/reset-budget", "Zero the budget windows"),
        ("/exit", "Leave the session"),
    ];
    rows.iter()
        .map(|(cmd, desc)| format!("  {:<18} {}", style(cmd).cyan(), style(desc).dim()))
        .collect::<Vec<_>>()
        .join("\n")
}
