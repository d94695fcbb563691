//! Statistics for the map-entry cache.
//!
//! Counters are lock-free atomics so they can be bumped while the
//! structural lock is held for reading, without widening any critical
//! section.
//!
//! ```
//! use automount_cache::MapCache;
//!
//! let cache = MapCache::default();
//! cache.add("alice", Some("server:/export/alice"), 1).unwrap();
//! assert!(cache.lookup("alice").is_some());
//!
//! let snapshot = cache.stats().snapshot();
//! assert_eq!(snapshot.hits, 1);
//! assert_eq!(snapshot.entries, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing cache activity.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups answered by an exact key match.
    pub hits: AtomicU64,
    /// Lookups answered by the wildcard entry.
    pub wildcard_hits: AtomicU64,
    /// Lookups that found nothing.
    pub misses: AtomicU64,
    /// Entries currently linked into the table.
    pub entries: AtomicU64,
    /// Entries removed by an age sweep.
    pub evictions: AtomicU64,
    /// Entries removed by an explicit delete.
    pub deletions: AtomicU64,
    /// Reverse-index hints confirmed against an entry.
    pub reverse_hits: AtomicU64,
    /// Reverse-index hints that pointed at a bucket with no matching entry.
    pub reverse_stale: AtomicU64,
}

impl CacheStats {
    /// Create zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_wildcard_hit(&self) {
        self.wildcard_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_insert(&self) {
        self.entries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_evictions(&self, count: u64) {
        self.entries.fetch_sub(count, Ordering::Relaxed);
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_deletions(&self, count: u64) {
        self.entries.fetch_sub(count, Ordering::Relaxed);
        self.deletions.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reverse_hit(&self) {
        self.reverse_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reverse_stale(&self) {
        self.reverse_stale.fetch_add(1, Ordering::Relaxed);
    }

    /// Entries were dropped wholesale by a release or re-init.
    #[inline]
    pub(crate) fn record_cleared(&self) {
        self.entries.store(0, Ordering::Relaxed);
    }

    /// Fraction of lookups answered by an entry (exact or wildcard).
    ///
    /// Returns 0.0 if no lookups have been performed.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) + self.wildcard_hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Reset the activity counters. The live entry count is left alone.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.wildcard_hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.deletions.store(0, Ordering::Relaxed);
        self.reverse_hits.store(0, Ordering::Relaxed);
        self.reverse_stale.store(0, Ordering::Relaxed);
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            wildcard_hits: self.wildcard_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            deletions: self.deletions.load(Ordering::Relaxed),
            reverse_hits: self.reverse_hits.load(Ordering::Relaxed),
            reverse_stale: self.reverse_stale.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub wildcard_hits: u64,
    pub misses: u64,
    pub entries: u64,
    pub evictions: u64,
    pub deletions: u64,
    pub reverse_hits: u64,
    pub reverse_stale: u64,
}
