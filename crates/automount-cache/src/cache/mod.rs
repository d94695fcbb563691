//! The map-entry cache: hash table, entry lifecycle and lookups.
//!
//! # Locking
//!
//! One structural `RwLock` guards bucket membership, the entry arena and the
//! reverse index. Reads (`lookup*`, `partial_match`, snapshots) take it
//! shared; anything that links or unlinks entries takes it exclusively.
//! Each entry additionally has its own mutex for its mount instruction,
//! age, (device, inode) and group linkage.
//!
//! The structural lock is always acquired first. No code path acquires it
//! while holding an entry lock, and no code path holds two entry locks at
//! once.
//!
//! # Bucket order
//!
//! Entries sharing a key are contiguous within their bucket and kept in
//! insertion order, so [`MapCache::lookup_next`] walks the candidates for a
//! key in the order the map source listed them. Entries with distinct keys
//! are prepended and have no meaningful order.

mod enumerate;
mod multi;
mod reverse;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::arena::EntryArena;
use crate::config::CacheConfig;
use crate::entry::{EntryId, MapEntry, WILDCARD_KEY};
use crate::error::{CacheError, Result, UpdateOutcome};
use crate::hash::key_hash;
use crate::paths;
use crate::stats::CacheStats;

pub use multi::{OffsetCursor, Offsets};

/// Everything guarded by the structural lock.
#[derive(Debug)]
pub(crate) struct Table {
    initialized: bool,
    entries: EntryArena,
    buckets: Vec<Vec<EntryId>>,
    /// Reverse-index hints: (device, inode) slot -> key bucket.
    ino_index: Vec<Option<usize>>,
}

impl Table {
    fn new(table_size: usize) -> Self {
        Self {
            initialized: true,
            entries: EntryArena::new(),
            buckets: vec![Vec::new(); table_size],
            ino_index: vec![None; table_size],
        }
    }

    /// Empty the table in place. The arena is cleared rather than
    /// replaced so ids from before the reset keep failing to resolve.
    fn reset(&mut self, table_size: usize) {
        self.entries.clear();
        self.buckets = vec![Vec::new(); table_size];
        self.ino_index = vec![None; table_size];
        self.initialized = true;
    }

    fn teardown(&mut self) {
        self.entries.clear();
        self.buckets.iter_mut().for_each(Vec::clear);
        self.ino_index.fill(None);
        self.initialized = false;
    }

    /// Live entries of one bucket, in chain order.
    pub(crate) fn bucket_entries(&self, bucket: usize) -> impl Iterator<Item = &Arc<MapEntry>> {
        self.buckets
            .get(bucket)
            .into_iter()
            .flatten()
            .filter_map(|id| self.entries.get(*id))
    }

    /// Live entries of every bucket.
    pub(crate) fn all_entries(&self) -> impl Iterator<Item = &Arc<MapEntry>> {
        self.buckets
            .iter()
            .flatten()
            .filter_map(|id| self.entries.get(*id))
    }

    pub(crate) fn entry(&self, id: EntryId) -> Option<&Arc<MapEntry>> {
        self.entries.get(id)
    }

    fn find(&self, bucket: usize, key: &str) -> Option<&Arc<MapEntry>> {
        self.bucket_entries(bucket).find(|me| me.key() == key)
    }

    /// Chain position of the last entry in the run sharing `key`.
    fn last_position_of(&self, bucket: usize, key: &str) -> Option<usize> {
        let chain = self.buckets.get(bucket)?;
        let key_at = |id: &EntryId| self.entries.get(*id).map(|me| me.key());
        let first = chain.iter().position(|id| key_at(id) == Some(key))?;
        let run = chain[first..]
            .iter()
            .take_while(|id| key_at(id) == Some(key))
            .count();
        Some(first + run - 1)
    }
}

/// Concurrent map-entry cache of an automount daemon.
///
/// Maps mount-relative or absolute keys to opaque mount instructions,
/// supports several candidate instructions per key, multi-mount offset
/// groups and a best-effort (device, inode) reverse index.
///
/// # Example
///
/// ```
/// use automount_cache::{MapCache, UpdateOutcome};
///
/// let cache = MapCache::default();
/// cache.add("alice", Some("fileserver:/export/home/alice"), 100).unwrap();
/// cache.add("*", Some("fileserver:/export/home/&"), 100).unwrap();
///
/// let me = cache.lookup("alice").unwrap();
/// assert_eq!(me.mapent().as_deref(), Some("fileserver:/export/home/alice"));
///
/// // Unknown relative keys fall back to the wildcard entry.
/// assert_eq!(cache.lookup("bob").unwrap().key(), "*");
///
/// // Re-reading the same instruction only refreshes the age.
/// let outcome = cache.update("alice", Some("fileserver:/export/home/alice"), 200).unwrap();
/// assert_eq!(outcome, UpdateOutcome::Unchanged);
/// ```
#[derive(Debug)]
pub struct MapCache {
    config: CacheConfig,
    table: RwLock<Table>,
    stats: CacheStats,
}

impl Default for MapCache {
    fn default() -> Self {
        Self::build(CacheConfig::default())
    }
}

impl MapCache {
    /// Creates an initialized, empty cache.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: CacheConfig) -> Self {
        let table = Table::new(config.table_size);
        Self {
            config,
            table: RwLock::new(table),
            stats: CacheStats::new(),
        }
    }

    /// The configuration the cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Activity counters.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of entries currently in the table.
    pub fn len(&self) -> usize {
        self.table.read().entries.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.table.read().entries.is_empty()
    }

    /// Whether the cache is usable (not released).
    pub fn is_initialized(&self) -> bool {
        self.table.read().initialized
    }

    /// Discard all state and start over with an empty table.
    ///
    /// Safe to call repeatedly and after [`release`](Self::release).
    pub fn init(&self) {
        let mut table = self.table.write();
        table.reset(self.config.table_size);
        self.stats.record_cleared();
        tracing::debug!(buckets = self.config.table_size, "map cache initialized");
    }

    /// Destroy every entry unconditionally.
    ///
    /// Until [`init`](Self::init) runs again, additions fail with
    /// [`CacheError::Uninitialized`] and reads find nothing. Handles held by
    /// callers stay readable but no longer resolve in the table.
    pub fn release(&self) {
        let mut table = self.table.write();
        let dropped = table.entries.len();
        table.teardown();
        self.stats.record_cleared();
        tracing::debug!(dropped, "map cache released");
    }

    /// Bucket index of a key.
    pub fn hash(&self, key: &str) -> usize {
        key_hash(key, self.config.table_size)
    }

    /// Full path of `key` below `root`, bounded by the configured maximum.
    pub fn full_path(&self, root: &Path, key: &str) -> Result<PathBuf> {
        paths::full_path(root, key, self.config.key_max_len).inspect_err(|e| {
            tracing::error!(key, error = %e, "cannot build path for key");
        })
    }

    /// Find the entry for `key`, falling back to the wildcard entry.
    ///
    /// The fallback only applies to relative keys and only when the table
    /// is not empty; absolute (direct-map) keys never match the wildcard.
    pub fn lookup(&self, key: &str) -> Option<Arc<MapEntry>> {
        let table = self.table.read();
        if !table.initialized {
            return None;
        }

        if let Some(me) = table.find(self.hash(key), key) {
            self.stats.record_hit();
            return Some(Arc::clone(me));
        }

        if !key.starts_with('/')
            && !table.entries.is_empty()
            && let Some(me) = table.find(self.hash(WILDCARD_KEY), WILDCARD_KEY)
        {
            self.stats.record_wildcard_hit();
            return Some(Arc::clone(me));
        }

        self.stats.record_miss();
        None
    }

    /// Find the first entry whose key is exactly `key`, with no wildcard
    /// fallback.
    pub fn lookup_exact(&self, key: &str) -> Option<Arc<MapEntry>> {
        let table = self.table.read();
        table.find(self.hash(key), key).cloned()
    }

    /// The next candidate for the same key, in insertion order.
    pub fn lookup_next(&self, entry: &MapEntry) -> Option<Arc<MapEntry>> {
        let table = self.table.read();
        let chain = table.buckets.get(self.hash(entry.key()))?;
        let pos = chain.iter().position(|id| *id == entry.id())?;
        let next = table.entries.get(*chain.get(pos + 1)?)?;
        (next.key() == entry.key()).then(|| Arc::clone(next))
    }

    /// Any entry (the head of the first non-empty bucket).
    ///
    /// An existence probe only; the choice carries no ordering guarantee.
    pub fn lookup_first(&self) -> Option<Arc<MapEntry>> {
        let table = self.table.read();
        table.all_entries().next().cloned()
    }

    /// First entry whose key lies below the directory `prefix`.
    ///
    /// Matches keys strictly longer than `prefix` that start with it and
    /// continue with `/`.
    pub fn partial_match(&self, prefix: &str) -> Option<Arc<MapEntry>> {
        let table = self.table.read();
        let plen = prefix.len();
        table
            .all_entries()
            .find(|me| {
                let key = me.key().as_bytes();
                key.len() > plen && key.starts_with(prefix.as_bytes()) && key[plen] == b'/'
            })
            .cloned()
    }

    /// Add a new entry.
    ///
    /// If entries with this key already exist the new one goes after the
    /// last of them, preserving the order the map source listed them in.
    /// Otherwise (and always for the wildcard key) it is prepended to its
    /// bucket.
    pub fn add(&self, key: &str, mapent: Option<&str>, age: u64) -> Result<()> {
        validate_key(key)?;
        let key_copy = try_copy(key)?;
        let mapent_copy = mapent.map(try_copy).transpose()?;

        let mut table = self.table.write();
        self.insert_locked(&mut table, key_copy, mapent_copy, age)
            .inspect_err(|e| tracing::error!(key, error = %e, "failed to add cache entry"))?;
        Ok(())
    }

    fn insert_locked(
        &self,
        table: &mut Table,
        key: String,
        mapent: Option<String>,
        age: u64,
    ) -> Result<Arc<MapEntry>> {
        if !table.initialized {
            return Err(CacheError::Uninitialized);
        }

        let bucket = self.hash(&key);
        let position = if key == WILDCARD_KEY {
            None
        } else {
            table.last_position_of(bucket, &key)
        };

        table.buckets[bucket].try_reserve(1)?;
        let entry = table
            .entries
            .insert_with(|id| MapEntry::new(id, key, mapent, age))?;

        let chain = &mut table.buckets[bucket];
        match position {
            Some(last) => chain.insert(last + 1, entry.id()),
            None => chain.insert(0, entry.id()),
        }
        self.stats.record_insert();
        tracing::debug!(key = entry.key(), id = %entry.id(), "added cache entry");
        Ok(entry)
    }

    /// Add or refresh the entry for `key`.
    ///
    /// A missing entry is added and reported as [`UpdateOutcome::Updated`].
    /// An existing entry has its mount instruction replaced only if it
    /// differs byte-for-byte; its age is refreshed either way.
    pub fn update(&self, key: &str, mapent: Option<&str>, age: u64) -> Result<UpdateOutcome> {
        validate_key(key)?;

        let table = self.table.upgradable_read();
        if !table.initialized {
            return Err(CacheError::Uninitialized);
        }

        if let Some(me) = table.find(self.hash(key), key) {
            let mut state = me.state();
            let outcome = if state.mapent.as_deref() == mapent {
                UpdateOutcome::Unchanged
            } else {
                state.mapent = mapent.map(try_copy).transpose()?;
                UpdateOutcome::Updated
            };
            state.age = age;
            return Ok(outcome);
        }

        let key_copy = try_copy(key)?;
        let mapent_copy = mapent.map(try_copy).transpose()?;
        let mut table = RwLockUpgradableReadGuard::upgrade(table);
        self.insert_locked(&mut table, key_copy, mapent_copy, age)
            .inspect_err(|e| tracing::debug!(key, error = %e, "update failed"))?;
        Ok(UpdateOutcome::Updated)
    }

    /// Remove every entry with exactly this key.
    ///
    /// Fails without removing anything if any of them is still linked into
    /// a populated multi-mount group. With `remove_backing_dir`, the
    /// entry's directory and its emptied parents below `root` are removed
    /// afterwards on a best-effort basis.
    pub fn delete(&self, root: &Path, key: &str, remove_backing_dir: bool) -> Result<()> {
        let path = self.full_path(root, key)?;

        let removed = {
            let mut table = self.table.write();
            if !table.initialized {
                return Err(CacheError::Uninitialized);
            }

            let bucket = self.hash(key);
            let matching: Vec<EntryId> = table
                .bucket_entries(bucket)
                .filter(|me| me.key() == key)
                .map(|me| me.id())
                .collect();
            if matching.is_empty() {
                return Err(CacheError::NotFound {
                    key: key.to_string(),
                });
            }

            let guarded = matching
                .iter()
                .filter_map(|id| table.entries.get(*id))
                .any(|me| me.is_guarded());
            if guarded {
                tracing::error!(key, "refusing to delete entry linked into a multi-mount group");
                return Err(CacheError::Guarded {
                    key: key.to_string(),
                });
            }

            table.buckets[bucket].retain(|id| !matching.contains(id));
            for id in &matching {
                table.entries.remove(*id);
            }
            matching.len()
        };

        self.stats.record_deletions(removed as u64);
        tracing::debug!(key, removed, "deleted cache entries");

        if remove_backing_dir {
            paths::remove_empty_dirs(&path, root);
        }
        Ok(())
    }

    /// Evict every entry older than `older_than`.
    ///
    /// Entries still linked into a populated multi-mount group are skipped;
    /// groups are torn down through [`delete_group`](Self::delete_group).
    /// Backing directories of evicted entries are removed on a best-effort
    /// basis. Returns the number of evicted entries.
    pub fn clean(&self, root: &Path, older_than: u64) -> usize {
        let evicted: Vec<Arc<MapEntry>> = {
            let mut table = self.table.write();
            if !table.initialized {
                return 0;
            }

            let Table {
                buckets, entries, ..
            } = &mut *table;
            let mut expired = Vec::new();
            for chain in buckets.iter_mut() {
                chain.retain(|id| {
                    let Some(me) = entries.get(*id) else {
                        return false;
                    };
                    let state = me.state();
                    if state.is_guarded() || state.age >= older_than {
                        return true;
                    }
                    expired.push(*id);
                    false
                });
            }
            expired
                .into_iter()
                .filter_map(|id| entries.remove(id))
                .collect()
        };

        if evicted.is_empty() {
            return 0;
        }
        self.stats.record_evictions(evicted.len() as u64);

        for me in &evicted {
            match paths::full_path(root, me.key(), self.config.key_max_len) {
                Ok(path) => {
                    paths::remove_empty_dirs(&path, root);
                }
                Err(e) => tracing::warn!(key = me.key(), error = %e, "skipping directory removal"),
            }
        }

        tracing::debug!(evicted = evicted.len(), older_than, "cleaned map cache");
        evicted.len()
    }

    /// Snapshot the ids of ungrouped entries and group owners.
    fn representative_ids(&self) -> Vec<EntryId> {
        let table = self.table.read();
        table
            .all_entries()
            .filter(|me| me.is_representative())
            .map(|me| me.id())
            .collect()
    }

    /// Re-resolve an id taken earlier.
    pub(crate) fn resolve(&self, id: EntryId) -> Option<Arc<MapEntry>> {
        self.table.read().entry(id).cloned()
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        tracing::error!("rejecting empty map key");
        return Err(CacheError::InvalidKey { key: String::new() });
    }
    Ok(())
}

/// Copy a string, surfacing allocation failure instead of aborting.
fn try_copy(s: &str) -> Result<String> {
    let mut owned = String::new();
    owned.try_reserve_exact(s.len())?;
    owned.push_str(s);
    Ok(owned)
}
