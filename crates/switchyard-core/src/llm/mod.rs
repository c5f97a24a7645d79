//! Backend abstractions and dispatch.
//!
//! - `LlmProvider`: RPITIT trait for concrete backend adapters
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `ProviderHealth`: per-backend circuit breaker and liveness stats
//! - `ProviderRegistry`: ranked set of backends
//! - `Dispatcher`: fallback/retry across the ranked backends

pub mod box_provider;
pub mod dispatch;
pub mod health;
pub mod provider;
pub mod registry;
