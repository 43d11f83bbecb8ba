//! Cache Store Module
//!
//! Entry map with LRU bounding, TTL expiry, and per-tenant generation
//! counters used for write invalidation.

use std::collections::HashMap;
use std::time::Duration;

use crate::aggregation::AggregateResult;
use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CacheKey, CacheStats, LruTracker};
use crate::store::RecordKind;
use crate::tenant::TenantId;

// == Lookup ==
/// Outcome of consulting the cache for a key.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Within TTL and generation-current
    Fresh(AggregateResult),
    /// Present but expired or outdated; only usable as a flagged fallback
    Stale(AggregateResult),
    Missing,
}

// == Cache Store ==
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<CacheKey, CacheEntry>,
    lru: LruTracker<CacheKey>,
    stats: CacheStats,
    /// Write counters per tenant and source record kind
    generations: HashMap<(TenantId, RecordKind), u64>,
    /// Bumped to invalidate every tenant at once
    epoch: u64,
    max_entries: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a store holding at most `max_entries` entries (at least one).
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            generations: HashMap::new(),
            epoch: 0,
            max_entries: max_entries.max(1),
        }
    }

    // == Generations ==
    /// Current generation of `kind` records for `tenant_id`.
    pub fn generation(&self, tenant_id: &TenantId, kind: RecordKind) -> u64 {
        let own = self
            .generations
            .get(&(tenant_id.clone(), kind))
            .copied()
            .unwrap_or(0);
        self.epoch + own
    }

    /// Records a write, making every entry sourced from `kind` records of
    /// `tenant_id` stale. Returns the new generation.
    pub fn record_write(&mut self, tenant_id: &TenantId, kind: RecordKind) -> u64 {
        *self
            .generations
            .entry((tenant_id.clone(), kind))
            .or_insert(0) += 1;
        self.generation(tenant_id, kind)
    }

    /// Makes every entry of every tenant stale.
    pub fn bump_epoch(&mut self) {
        self.epoch += 1;
    }

    // == Lookup ==
    /// Classifies the entry for `key`, recording a hit or a miss.
    ///
    /// Stale entries are kept so they can back a degraded response.
    pub fn lookup(&mut self, key: &CacheKey) -> Lookup {
        let generation = self.generation(key.tenant_id(), key.metric().source());

        match self.entries.get(key) {
            Some(entry) if entry.is_live(generation) => {
                let result = entry.result.clone();
                self.stats.record_hit();
                self.lru.touch(key);
                Lookup::Fresh(result)
            }
            Some(entry) => {
                let result = entry.result.clone();
                self.stats.record_miss();
                Lookup::Stale(result)
            }
            None => {
                self.stats.record_miss();
                Lookup::Missing
            }
        }
    }

    /// Like [`lookup`](Self::lookup) but without touching stats or LRU order.
    pub fn peek(&self, key: &CacheKey) -> Lookup {
        let generation = self.generation(key.tenant_id(), key.metric().source());
        match self.entries.get(key) {
            Some(entry) if entry.is_live(generation) => Lookup::Fresh(entry.result.clone()),
            Some(entry) => Lookup::Stale(entry.result.clone()),
            None => Lookup::Missing,
        }
    }

    // == Insert ==
    /// Stores a computed result observed at `generation`.
    ///
    /// An existing entry from a newer generation is kept, so a slow
    /// computation that started before a write cannot overwrite a result
    /// computed after it. Returns whether the entry was stored.
    pub fn insert(
        &mut self,
        key: CacheKey,
        result: AggregateResult,
        generation: u64,
        ttl: Duration,
    ) -> bool {
        if let Some(existing) = self.entries.get(&key) {
            if existing.generation > generation {
                return false;
            }
        } else if self.entries.len() >= self.max_entries {
            if let Some(evicted) = self.lru.evict_oldest() {
                self.entries.remove(&evicted);
                self.stats.record_eviction();
            }
        }

        self.entries
            .insert(key.clone(), CacheEntry::new(result, ttl, generation));
        self.lru.touch(&key);
        self.stats.set_total_entries(self.entries.len());
        true
    }

    // == Cleanup Expired ==
    /// Removes entries expired for longer than `grace`.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self, grace: Duration) -> usize {
        let now = current_timestamp_ms();
        let before = self.entries.len();

        self.entries
            .retain(|_, entry| !entry.is_past_grace(grace, now));
        let entries = &self.entries;
        self.lru.retain(|k| entries.contains_key(k));

        self.stats.set_total_entries(self.entries.len());
        before - self.entries.len()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
