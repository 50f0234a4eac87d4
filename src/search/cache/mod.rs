
use crate::search::SearchHit;
use std::collections::HashMap;
use tracing::debug;

/// Key for one cached cascade result: the normalized query plus the
/// optional documentation scope it was evaluated under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query: String,
    pub doc_name: Option<String>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    hits: Vec<SearchHit>,
    last_used: u64,
    hit_count: u64,
}

/// Bounded exact-query memoization with least-recently-used eviction.
#[derive(Debug)]
pub struct QueryCache {
    capacity: usize,
    clock: u64,
    entries: HashMap<CacheKey, CacheEntry>,
}

impl QueryCache {
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            clock: 0,
            entries: HashMap::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up a cached result, bumping its recency and hit count.
    pub fn get(&mut self, key: &CacheKey) -> Option<Vec<SearchHit>> {
        self.clock += 1;
        let clock = self.clock;

        self.entries.get_mut(key).map(|entry| {
            entry.last_used = clock;
            entry.hit_count += 1;
            entry.hits.clone()
        })
    }

    /// Insert or replace a cached result; a later put for the same key wins.
    pub fn put(&mut self, key: CacheKey, hits: Vec<SearchHit>) {
        self.clock += 1;

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_least_recently_used();
        }

        self.entries.insert(
            key,
            CacheEntry {
                hits,
                last_used: self.clock,
                hit_count: 0,
            },
        );
    }

    pub fn invalidate(&mut self, key: &CacheKey) {
        self.entries.remove(key);
    }

    /// Drop every entry that references one of the given sections. Called
    /// when sections are replaced or deleted so stale results cannot be
    /// served.
    pub fn purge_sections(&mut self, section_ids: &[i64]) {
        if section_ids.is_empty() {
            return;
        }

        self.entries.retain(|_, entry| {
            !entry
                .hits
                .iter()
                .any(|hit| section_ids.contains(&hit.section_id))
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict_least_recently_used(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());

        if let Some(key) = victim {
            debug!("Evicting cached query: {:?}", key.query);
            self.entries.remove(&key);
        }
    }
}
