//! Infrastructure layer for Switchyard.
//!
//! Concrete implementations of the traits defined in `switchyard-core`:
//! HTTP backend adapters (OpenAI-compatible, Anthropic), the offline local
//! backend, embedders for the semantic cache, and the TOML config loader.

pub mod config;
pub mod embedding;
pub mod llm;
