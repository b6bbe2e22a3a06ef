use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use crate::types::ResolutionResult;

type CacheKey = (String, u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// Memoized resolutions keyed by `(original selector, options hash)`.
///
/// One cache belongs to one orchestrator. Entries are dropped when they
/// expire or fail re-validation.
#[derive(Default)]
pub struct ResolutionCache {
    entries: DashMap<CacheKey, (ResolutionResult, Instant)>,
    ttl_ms: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResolutionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_ms: AtomicU64::new(duration_to_millis(ttl)),
            ..Self::default()
        }
    }

    pub fn get(&self, original: &str, options_hash: u64) -> Option<ResolutionResult> {
        let key = (original.to_string(), options_hash);
        let ttl = self.current_ttl();
        if let Some(entry) = self.entries.get(&key) {
            if ttl.is_zero() || entry.1.elapsed() <= ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.0.clone());
            }
        }
        if self.entries.remove(&key).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn put(&self, original: &str, options_hash: u64, result: ResolutionResult) {
        self.entries
            .insert((original.to_string(), options_hash), (result, Instant::now()));
    }

    /// Removes the entry only if it still holds the result with `result_id`.
    ///
    /// Check and removal happen under the shard lock, so a fresher entry
    /// written by a concurrent resolution survives.
    pub fn evict_if_current(&self, original: &str, options_hash: u64, result_id: &str) -> bool {
        let key = (original.to_string(), options_hash);
        let removed = self
            .entries
            .remove_if(&key, |_, (cached, _)| cached.id == result_id)
            .is_some();
        if removed {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Drops every entry for `original`, whatever the options.
    pub fn invalidate(&self, original: &str) {
        let before = self.entries.len();
        self.entries.retain(|(selector, _), _| selector != original);
        let removed = before.saturating_sub(self.entries.len()) as u64;
        self.evictions.fetch_add(removed, Ordering::Relaxed);
    }

    pub fn set_ttl(&self, ttl: Duration) {
        self.ttl_ms
            .store(duration_to_millis(ttl), Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Zero means entries never expire.
    fn current_ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms.load(Ordering::Relaxed))
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}
