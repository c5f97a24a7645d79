//! CLI command definitions for the `swyd` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod analytics;
pub mod chat;
pub mod interactive;
pub mod providers;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use switchyard_core::orchestrator::{ChatOptions, StreamOptions};
use switchyard_types::llm::GenerationParams;

/// Resilient front door for your LLM backends.
#[derive(Parser)]
#[command(name = "swyd", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.switchyard/config.toml).
    #[arg(long, global = true, env = "SWITCHYARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one prompt and print the full response.
    Chat {
        prompt: String,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// Send one prompt and print the response as it arrives.
    Stream {
        prompt: String,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// Multi-turn session with slash commands and live analytics.
    #[command(alias = "repl")]
    Interactive {
        /// System prompt for the session.
        #[arg(long)]
        system: Option<String>,

        /// Stream responses instead of waiting for them.
        #[arg(long)]
        stream: bool,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// List configured backends in fallback order.
    Providers {
        /// Send a tiny request to each backend to check connectivity.
        #[arg(long)]
        test: bool,
    },

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Per-request flags shared by chat, stream, and interactive.
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Model override (defaults to each backend's configured model).
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub temperature: Option<f64>,

    /// Attempts per backend.
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Bypass the semantic cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Skip budget admission (usage is still recorded).
    #[arg(long)]
    pub no_budget: bool,

    /// Do not read or write conversation history.
    #[arg(long)]
    pub no_history: bool,

    /// Named conversation session.
    #[arg(long)]
    pub session: Option<String>,
}

impl RequestArgs {
    fn params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop_sequences: None,
        }
    }

    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            model: self.model.clone(),
            use_conversation: !self.no_history,
            use_cache: !self.no_cache,
            use_budget: !self.no_budget,
            max_retries: self.max_retries,
            params: self.params(),
            session: self.session.clone(),
            ..ChatOptions::default()
        }
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions::from(&self.chat_options())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_request_flags_map_to_options() {
        let cli = Cli::parse_from([
            "swyd", "chat", "hello", "--no-cache", "--max-retries", "1", "--model", "gpt-4o-mini",
            "--session", "work",
        ]);
        let Commands::Chat { prompt, request } = cli.command else {
            panic!("expected chat");
        };
        assert_eq!(prompt, "hello");

        let options = request.chat_options();
        assert!(!options.use_cache);
        assert!(options.use_budget);
        assert!(options.use_conversation);
        assert_eq!(options.max_retries, 1);
        assert_eq!(options.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(options.session.as_deref(), Some("work"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["swyd", "providers", "--json", "-vv"]);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }
}
