//! Interactive session: read prompts from stdin, answer them, and expose
//! analytics and conversation controls via slash commands.
//!
//! Ctrl+C cancels the in-flight request, not the session.

pub mod commands;

use std::io::Write;

use anyhow::Result;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use switchyard_types::error::OrchestratorError;

use self::commands::{ReplCommand, render_help};
use super::RequestArgs;
use super::analytics::render_analytics;
use super::chat::{Output, print_response, stream_to_stdout};
use crate::state::AppState;

pub async fn run_interactive(
    state: &AppState,
    system: Option<String>,
    mut streaming: bool,
    mut args: RequestArgs,
    out: Output,
) -> Result<()> {
    state.ensure_backends()?;
    let orchestrator = &state.orchestrator;

    if let Some(system) = system {
        orchestrator
            .sessions()
            .get(args.session.as_deref())
            .set_system_prompt(system)
            .await;
    }

    if !out.quiet {
        println!();
        println!(
            "  {} {} backend{} ready. Type {} for commands.",
            style("⚡").bold(),
            orchestrator.registry().len(),
            if orchestrator.registry().len() == 1 { "" } else { "s" },
            style("/help").cyan()
        );
        println!();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !out.quiet {
            print!("{} ", style(">").green().bold());
            std::io::stdout().flush()?;
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        if let Some(command) = commands::parse(&line) {
            if !handle_command(state, command, &mut args, &mut streaming, out).await? {
                break;
            }
            continue;
        }

        let result = if streaming {
            tokio::select! {
                r = stream_to_stdout(state, &line, args.stream_options(), out) => r,
                _ = tokio::signal::ctrl_c() => Err(OrchestratorError::Cancelled.into()),
            }
        } else {
            tokio::select! {
                r = orchestrator.chat(&line, args.chat_options()) => {
                    r.map_err(anyhow::Error::from).and_then(|resp| print_response(&resp, out))
                }
                _ = tokio::signal::ctrl_c() => Err(OrchestratorError::Cancelled.into()),
            }
        };

        if let Err(e) = result {
            eprintln!("  {} {e:#}", style("✗").red().bold());
        }
    }

    Ok(())
}

/// Returns `false` when the session should end.
async fn handle_command(
    state: &AppState,
    command: ReplCommand,
    args: &mut RequestArgs,
    streaming: &mut bool,
    out: Output,
) -> Result<bool> {
    let orchestrator = &state.orchestrator;
    let session = orchestrator.sessions().get(args.session.as_deref());

    match command {
        ReplCommand::Help => println!("{}", render_help()),
        ReplCommand::Exit => return Ok(false),
        ReplCommand::Reset => {
            session.reset().await;
            println!("  {}", style("History cleared.").dim());
        }
        ReplCommand::System(text) => {
            session.set_system_prompt(text).await;
            println!("  {}", style("System prompt updated.").dim());
        }
        ReplCommand::Stats => {
            let analytics = orchestrator.analytics().await;
            if out.json {
                println!("{}", serde_json::to_string_pretty(&analytics)?);
            } else {
                println!("{}", render_analytics(&analytics));
            }
        }
        ReplCommand::History(n) => {
            for turn in session.recent(n).await {
                let role = if turn.synthetic {
                    style(format!("{} (summary)", turn.role)).magenta()
                } else {
                    style(turn.role.to_string()).cyan()
                };
                println!("  {role}: {}", turn.content);
            }
        }
        ReplCommand::Session(name) => {
            println!(
                "  {} {}",
                style("Session:").dim(),
                name.as_deref().unwrap_or("default")
            );
            args.session = name;
        }
        ReplCommand::ClearCache => {
            orchestrator.clear_cache();
            println!("  {}", style("Cache cleared.").dim());
        }
        ReplCommand::ResetBudget => {
            orchestrator.reset_budget();
            println!("  {}", style("Budget windows reset.").dim());
        }
        ReplCommand::Stream => {
            *streaming = !*streaming;
            println!(
                "  {} {}",
                style("Streaming").dim(),
                if *streaming { "on" } else { "off" }
            );
        }
        ReplCommand::Unknown(cmd) => {
            eprintln!(
                "  {} Unknown command {}. Type {} for help.",
                style("?").yellow().bold(),
                style(cmd).yellow(),
                style("/help").cyan()
            );
        }
    }
    Ok(true)
}
