//! Bounded TTL memo of completed research runs, keyed by normalized topic.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use webforage_core::ResearchResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: ResearchResult,
    cached_at: Instant,
}

/// Process-lifetime, best-effort cache. Entries expire `ttl` after being
/// written; capacity overflow evicts the oldest entry by `cached_at`.
///
/// The clock is a parameter on the `_at` accessors so expiry and eviction
/// are testable without sleeping; `get`/`put` are thin `Instant::now()`
/// wrappers.
#[derive(Debug)]
pub struct ResultCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    capacity: usize,
}

impl ResultCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ResearchResult> {
        self.get_at(key, Instant::now())
    }

    /// A hit must still be inside the TTL window at `now`. Stale entries
    /// are ignored, not removed; the next `put` overwrites them.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<&ResearchResult> {
        let entry = self.entries.get(key)?;
        let age = now.saturating_duration_since(entry.cached_at);
        (age < self.ttl).then_some(&entry.result)
    }

    pub fn put(&mut self, key: &str, result: ResearchResult) {
        self.put_at(key, result, Instant::now());
    }

    /// Overwrites any prior entry for `key`; the entry just written is
    /// never the eviction victim.
    pub fn put_at(&mut self, key: &str, result: ResearchResult, now: Instant) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                result,
                cached_at: now,
            },
        );
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .min_by_key(|(_, e)| e.cached_at)
                .map(|(k, _)| k.clone());
            let Some(oldest) = oldest else { break };
            self.entries.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
