//! Request orchestration engine for Switchyard.
//!
//! Backend capability traits and the ranked registry, the fallback/retry
//! dispatcher, spend control, the semantic response cache, conversation
//! state, the tool registry, and the `Orchestrator` facade tying them
//! together. No HTTP here: concrete adapters live in switchyard-infra.

pub mod budget;
pub mod cache;
pub mod conversation;
pub mod llm;
pub mod orchestrator;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;
