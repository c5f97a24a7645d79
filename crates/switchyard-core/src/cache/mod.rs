//! Semantic response cache.
//!
//! Responses are keyed by the embedding of the query that produced them. A
//! lookup hits when the closest live entry's cosine similarity reaches the
//! configured threshold. Entries expire after a TTL and the least-hit,
//! least-recently-hit entry is evicted when the table is full.
//!
//! Embeddings are computed before the table lock is taken.

pub mod box_embedder;
pub mod embedder;
pub mod similarity;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use switchyard_types::analytics::CacheStats;
use switchyard_types::config::CacheConfig;
use switchyard_types::error::CacheError;

use self::box_embedder::BoxEmbedder;
use self::similarity::cosine_similarity;

/// One cached response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub query: String,
    pub embedding: Vec<f32>,
    pub response: String,
    pub created_at: Instant,
    pub last_hit_at: Instant,
    pub hit_count: u64,
}

#[derive(Debug, Default)]
struct CacheTable {
    entries: Vec<CacheEntry>,
    /// Fixed by the first stored vector.
    dimension: Option<usize>,
}

impl CacheTable {
    fn check_dimension(&self, actual: usize) -> Result<(), CacheError> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(CacheError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    fn sweep(&mut self, now: Instant, ttl: Duration) {
        self.entries
            .retain(|e| now.saturating_duration_since(e.created_at) <= ttl);
    }
}

#[derive(Debug)]
pub struct SemanticCache {
    config: CacheConfig,
    embedder: Option<Arc<BoxEmbedder>>,
    table: Mutex<CacheTable>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl SemanticCache {
    pub fn new(config: CacheConfig, embedder: Option<Arc<BoxEmbedder>>) -> Self {
        if config.enabled && embedder.is_none() {
            tracing::info!("Semantic cache enabled but no embedder configured; caching is off");
        }
        Self {
            config,
            embedder,
            table: Mutex::new(CacheTable::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Enabled and backed by an embedder.
    pub fn is_active(&self) -> bool {
        self.config.enabled && self.embedder.is_some()
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.ttl_secs)
    }

    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, CacheError> {
        match &self.embedder {
            Some(embedder) if self.config.enabled => Ok(Some(embedder.embed_one(text).await?)),
            _ => Ok(None),
        }
    }

    /// Find a cached response for a semantically equivalent query.
    pub async fn lookup(&self, query: &str) -> Result<Option<String>, CacheError> {
        let embedding = match self.embed(query).await {
            Ok(Some(embedding)) => embedding,
            Ok(None) => return Ok(None),
            Err(err) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Err(err);
            }
        };

        let now = Instant::now();
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = table.check_dimension(embedding.len()) {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Err(err);
        }
        table.sweep(now, self.ttl());

        let best = table
            .entries
            .iter_mut()
            .map(|e| (cosine_similarity(&embedding, &e.embedding), e))
            .filter(|(sim, _)| *sim >= self.config.similarity_threshold)
            .max_by(|(sa, ea), (sb, eb)| {
                sa.total_cmp(sb).then_with(|| ea.last_hit_at.cmp(&eb.last_hit_at))
            });

        match best {
            Some((similarity, entry)) => {
                entry.last_hit_at = now;
                entry.hit_count += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    similarity,
                    cached_query = %entry.query,
                    hit_count = entry.hit_count,
                    "Semantic cache hit"
                );
                Ok(Some(entry.response.clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Semantic cache miss");
                Ok(None)
            }
        }
    }

    /// Cache `response` under the embedding of `query`.
    pub async fn store(&self, query: &str, response: &str) -> Result<(), CacheError> {
        let Some(embedding) = self.embed(query).await? else {
            return Ok(());
        };

        let now = Instant::now();
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.check_dimension(embedding.len())?;
        table.dimension = Some(embedding.len());
        table.sweep(now, self.ttl());

        table.entries.push(CacheEntry {
            query: query.to_string(),
            embedding,
            response: response.to_string(),
            created_at: now,
            last_hit_at: now,
            hit_count: 0,
        });

        while table.entries.len() > self.config.max_entries {
            // Entries stay in insertion order, so exact ties evict the oldest.
            let victim = table
                .entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| (e.hit_count, e.last_hit_at))
                .map(|(i, _)| i);
            let Some(idx) = victim else { break };
            let evicted = table.entries.remove(idx);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(query = %evicted.query, hit_count = evicted.hit_count, "Cache entry evicted");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.is_active(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Drop every entry. The vector dimension is fixed again by the next store.
    pub fn clear(&self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.entries.clear();
        table.dimension = None;
        tracing::info!("Semantic cache cleared");
    }
}
