//! Error taxonomy shared across the workspace.
//!
//! `LlmError` (in [`crate::llm`]) describes a single backend attempt. The
//! enums here describe what callers of the dispatcher, cache, tool registry
//! and orchestrator actually see.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::llm::LlmError;

/// How a failed attempt should be handled by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Transient: retry the same backend after a backoff.
    Retryable,
    /// Permanent for this backend: advance to the next one.
    Fatal,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::Retryable => write!(f, "retryable"),
            FailureClass::Fatal => write!(f, "fatal"),
        }
    }
}

/// Final failure record for one attempted backend.
#[derive(Debug, Clone)]
pub struct BackendFailure {
    pub backend: String,
    pub class: FailureClass,
    pub attempts: u32,
    pub error: LlmError,
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} attempt{}): {}",
            self.backend,
            self.class,
            self.attempts,
            if self.attempts == 1 { "" } else { "s" },
            self.error
        )
    }
}

fn join_failures(failures: &[BackendFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Aggregate failure of a dispatch across every candidate backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error(
        "all providers failed [{}]; skipped: {:?}",
        join_failures(.failures),
        .skipped
    )]
    AllProvidersFailed {
        failures: Vec<BackendFailure>,
        skipped: Vec<String>,
    },

    #[error("no providers registered")]
    NoProviders,
}

/// Errors from the semantic cache. Callers treat these as a miss.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors from an embedder.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding model unavailable: {0}")]
    Unavailable(String),

    #[error("embedding failed: {0}")]
    Failed(String),
}

/// Errors from the tool registry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("invalid arguments for tool '{tool}': {message}")]
    Validation { tool: String, message: String },

    #[error("tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },
}

/// Which ceiling an admission check would exceed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenialReason {
    HourlyTokens { projected: u64, limit: u64 },
    DailyTokens { projected: u64, limit: u64 },
    HourlyCost { projected: f64, limit: f64 },
    DailyCost { projected: f64, limit: f64 },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::HourlyTokens { projected, limit } => {
                write!(f, "hourly token limit ({projected} > {limit})")
            }
            DenialReason::DailyTokens { projected, limit } => {
                write!(f, "daily token limit ({projected} > {limit})")
            }
            DenialReason::HourlyCost { projected, limit } => {
                write!(f, "hourly cost limit (${projected:.4} > ${limit:.2})")
            }
            DenialReason::DailyCost { projected, limit } => {
                write!(f, "daily cost limit (${projected:.4} > ${limit:.2})")
            }
        }
    }
}

/// Errors surfaced by the orchestrator facade.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OrchestratorError {
    #[error("budget exceeded: {0}")]
    BudgetExceeded(DenialReason),

    #[error(
        "all providers failed [{}]; skipped: {:?}",
        join_failures(.failures),
        .skipped
    )]
    AllProvidersFailed {
        failures: Vec<BackendFailure>,
        skipped: Vec<String>,
    },

    #[error("no providers registered")]
    NoProviders,

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("request cancelled")]
    Cancelled,

    #[error("stream failed: {0}")]
    Stream(LlmError),
}

impl From<DispatchError> for OrchestratorError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::AllProvidersFailed { failures, skipped } => {
                OrchestratorError::AllProvidersFailed { failures, skipped }
            }
            DispatchError::NoProviders => OrchestratorError::NoProviders,
        }
    }
}
