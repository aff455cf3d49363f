use crate::logic::estimate::Estimate;
use crate::model::{generate_id, Id};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Cache entry for a visitor's estimate
#[derive(Clone, Debug)]
struct CacheEntry {
    estimate: Estimate,
    last_accessed: Instant,
}

/// In-memory store for visitor estimates with TTL.
///
/// Estimates are never persisted; an entry lives until it has been idle for
/// longer than the TTL.
#[derive(Debug, Clone)]
pub struct EstimateCache {
    entries: Arc<RwLock<HashMap<Id, CacheEntry>>>,
    ttl: Duration,
}

impl EstimateCache {
    /// Create a new cache with 1-hour TTL
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(3600))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Start an empty estimate and return its id
    pub async fn create(&self) -> Id {
        let id = generate_id();
        let mut entries = self.entries.write().await;
        entries.insert(
            id.clone(),
            CacheEntry {
                estimate: Estimate::new(),
                last_accessed: Instant::now(),
            },
        );
        id
    }

    /// Get an estimate if present and not expired
    pub async fn get(&self, id: &Id) -> Option<Estimate> {
        let mut entries = self.entries.write().await;

        let entry = entries.get_mut(id)?;
        if entry.last_accessed.elapsed() > self.ttl {
            entries.remove(id);
            return None;
        }
        entry.last_accessed = Instant::now();
        Some(entry.estimate.clone())
    }

    /// Apply `f` to a live estimate in place. Returns `None` if the id is
    /// unknown or expired.
    pub async fn update<T>(&self, id: &Id, f: impl FnOnce(&mut Estimate) -> T) -> Option<T> {
        let mut entries = self.entries.write().await;

        let entry = entries.get_mut(id)?;
        if entry.last_accessed.elapsed() > self.ttl {
            entries.remove(id);
            return None;
        }
        entry.last_accessed = Instant::now();
        Some(f(&mut entry.estimate))
    }

    pub async fn remove(&self, id: &Id) -> bool {
        self.entries.write().await.remove(id).is_some()
    }

    /// Clear all expired entries. Returns how many were dropped.
    pub async fn clear_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let ttl = self.ttl;
        let now = Instant::now();
        entries.retain(|_, entry| now.duration_since(entry.last_accessed) <= ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl Default for EstimateCache {
    fn default() -> Self {
        Self::new()
    }
}
