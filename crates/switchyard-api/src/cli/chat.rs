//! One-shot `chat` and `stream` commands.

use std::io::Write;

use anyhow::{Context, Result};
use console::style;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing::field::Empty;

use switchyard_core::orchestrator::AIResponse;
use switchyard_observe::genai_attrs;

use super::RequestArgs;
use crate::state::AppState;

/// Output mode shared by the one-shot and interactive commands.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

/// A token cancelled on Ctrl+C.
pub fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

pub async fn run_chat(state: &AppState, prompt: &str, args: &RequestArgs, out: Output) -> Result<()> {
    state.ensure_backends()?;

    let span = tracing::info_span!(
        "swyd.chat",
        gen_ai.operation.name = genai_attrs::OP_CHAT,
        gen_ai.provider.name = Empty,
        gen_ai.usage.input_tokens = Empty,
        gen_ai.usage.output_tokens = Empty,
        switchyard.cache.hit = Empty,
    );

    let mut options = args.chat_options();
    options.cancel = Some(ctrl_c_token());

    let response = state
        .orchestrator
        .chat(prompt, options)
        .instrument(span.clone())
        .await
        .context("chat failed")?;

    span.record(genai_attrs::GEN_AI_PROVIDER_NAME, response.provider.as_str());
    span.record(genai_attrs::GEN_AI_USAGE_INPUT_TOKENS, response.usage.input_tokens);
    span.record(genai_attrs::GEN_AI_USAGE_OUTPUT_TOKENS, response.usage.output_tokens);
    span.record(genai_attrs::SWITCHYARD_CACHE_HIT, response.cached);

    print_response(&response, out)
}

pub fn print_response(response: &AIResponse, out: Output) -> Result<()> {
    if out.json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    if let Some(warning) = &response.failover_warning
        && !out.quiet
    {
        eprintln!("  {} {}", style("!").yellow().bold(), style(warning).yellow());
    }

    println!("{}", response.content);

    for tool in &response.tool_results {
        match (&tool.output, &tool.error) {
            (Some(output), _) => println!("  {} {}: {output}", style("✓").green(), tool.name),
            (None, Some(error)) => println!("  {} {}: {error}", style("✗").red(), tool.name),
            (None, None) => {}
        }
    }

    if !out.quiet {
        eprintln!("{}", style(footer(response)).dim());
    }
    Ok(())
}

/// `[provider · model · N tokens · 1.2s]`, or `[cache hit · 3ms]`.
pub fn footer(response: &AIResponse) -> String {
    let latency = response.latency.as_secs_f64();
    let latency = if latency < 1.0 {
        format!("{}ms", response.latency.as_millis())
    } else {
        format!("{latency:.1}s")
    };

    if response.cached {
        return format!("  [cache hit · {latency}]");
    }
    let model = if response.model.is_empty() {
        String::new()
    } else {
        format!(" · {}", response.model)
    };
    format!(
        "  [{}{model} · {} tokens · {latency}]",
        response.provider,
        response.usage.total()
    )
}

pub async fn run_stream(state: &AppState, prompt: &str, args: &RequestArgs, out: Output) -> Result<()> {
    state.ensure_backends()?;

    let span = tracing::info_span!(
        "swyd.stream",
        gen_ai.operation.name = genai_attrs::OP_CHAT_STREAM,
    );

    let mut options = args.stream_options();
    options.cancel = Some(ctrl_c_token());

    stream_to_stdout(state, prompt, options, out)
        .instrument(span)
        .await
}

/// Drive a fragment stream to stdout. JSON mode prints one `{"delta": ...}`
/// object per fragment.
pub async fn stream_to_stdout(
    state: &AppState,
    prompt: &str,
    options: switchyard_core::orchestrator::StreamOptions,
    out: Output,
) -> Result<()> {
    let mut stream = state.orchestrator.chat_stream(prompt, options);
    let mut stdout = std::io::stdout();

    while let Some(fragment) = stream.next().await {
        let fragment = fragment.context("stream failed")?;
        if out.json {
            println!("{}", serde_json::json!({ "delta": fragment }));
        } else {
            write!(stdout, "{fragment}")?;
            stdout.flush()?;
        }
    }
    if !out.json {
        writeln!(stdout)?;
    }
    Ok(())
}
