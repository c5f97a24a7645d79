//! Ranked registry of backends.
//!
//! Entries are ordered by priority (lower first), ties broken by the order
//! in which identifiers were first registered. The dispatcher takes a
//! snapshot of the ranking before any attempt, so concurrent registration
//! never disturbs an in-flight request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use switchyard_types::analytics::BackendStats;

use super::box_provider::BoxLlmProvider;
use super::health::{HealthPolicy, ProviderHealth};

/// Per-backend dispatch settings.
#[derive(Debug, Clone, Default)]
pub struct BackendSettings {
    /// Lower is tried first.
    pub priority: u32,
    /// Per-attempt timeout. `None` uses the dispatcher default.
    pub timeout: Option<Duration>,
    /// Default model when the request leaves it empty.
    pub model: Option<String>,
}

impl BackendSettings {
    pub fn with_priority(priority: u32) -> Self {
        Self {
            priority,
            ..Default::default()
        }
    }
}

/// One registered backend.
#[derive(Debug)]
pub struct BackendEntry {
    pub id: String,
    pub settings: BackendSettings,
    /// Registration sequence of the identifier, kept across re-registration.
    pub seq: u64,
    pub provider: Arc<BoxLlmProvider>,
    health: Arc<Mutex<ProviderHealth>>,
}

impl BackendEntry {
    /// Run `f` against this backend's health tracker.
    pub fn with_health<R>(&self, f: impl FnOnce(&mut ProviderHealth) -> R) -> R {
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut health)
    }

    pub fn stats(&self) -> BackendStats {
        self.with_health(|h| h.to_stats(&self.id, self.settings.priority, self.settings.model.as_deref()))
    }
}

/// Registry of backends, indexed by identifier and ranked by priority.
#[derive(Debug)]
pub struct ProviderRegistry {
    entries: RwLock<Vec<Arc<BackendEntry>>>,
    next_seq: AtomicU64,
    policy: HealthPolicy,
}

impl ProviderRegistry {
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            policy,
        }
    }

    /// Register a backend under its provider name.
    ///
    /// An existing identifier has its adapter and settings replaced; its
    /// stats and registration order are preserved.
    pub fn register(&self, provider: BoxLlmProvider, settings: BackendSettings) {
        let id = provider.name().to_string();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(pos) = entries.iter().position(|e| e.id == id) {
            let old = &entries[pos];
            let replacement = BackendEntry {
                id: id.clone(),
                settings,
                seq: old.seq,
                provider: Arc::new(provider),
                health: Arc::clone(&old.health),
            };
            entries[pos] = Arc::new(replacement);
            tracing::info!(provider = %id, "Backend re-registered");
            return;
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        tracing::info!(provider = %id, priority = settings.priority, "Backend registered");
        entries.push(Arc::new(BackendEntry {
            id,
            settings,
            seq,
            provider: Arc::new(provider),
            health: Arc::new(Mutex::new(ProviderHealth::new(self.policy.clone()))),
        }));
    }

    /// Remove a backend. Returns whether it was registered.
    pub fn unregister(&self, id: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| e.id != id);
        before != entries.len()
    }

    pub fn get(&self, id: &str) -> Option<Arc<BackendEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Snapshot of all backends in dispatch order.
    pub fn ranked(&self) -> Vec<Arc<BackendEntry>> {
        let mut ranked: Vec<Arc<BackendEntry>> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        ranked.sort_by_key(|e| (e.settings.priority, e.seq));
        ranked
    }

    /// Identifiers in dispatch order.
    pub fn list(&self) -> Vec<String> {
        self.ranked().iter().map(|e| e.id.clone()).collect()
    }

    pub fn stats(&self) -> Vec<BackendStats> {
        self.ranked().iter().map(|e| e.stats()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(HealthPolicy::default())
    }
}
