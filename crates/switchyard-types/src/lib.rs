//! Shared domain types for Switchyard.
//!
//! Plain data shared by every layer: LLM request/response shapes, stream
//! events, tool definitions, configuration, analytics snapshots, and the
//! error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod analytics;
pub mod config;
pub mod error;
pub mod llm;
pub mod tool;
