//! (device, inode) reverse index and ghost directories.
//!
//! The index is a table of hints: each (device, inode) slot remembers the
//! key bucket of the last entry recorded for it. Hints are never trusted on
//! their own; a lookup only returns an entry whose stored (device, inode)
//! matches exactly. Slot collisions overwrite earlier hints.

use std::io;
use std::path::Path;
use std::sync::Arc;

use super::MapCache;
use crate::entry::{DevIno, MapEntry, WILDCARD_KEY};
use crate::error::{CacheError, Result};
use crate::hash::{ino_hash, key_hash};
use crate::paths;

impl MapCache {
    /// Record that (`dev`, `ino`) probably belongs to `key`'s bucket.
    pub fn set_reverse_index(&self, key: &str, dev: u64, ino: u64) {
        let size = self.config.table_size;
        let mut table = self.table.write();
        if !table.initialized {
            return;
        }
        let slot = ino_hash(dev, ino, size);
        table.ino_index[slot] = Some(key_hash(key, size));
    }

    /// Find the entry whose backing directory has this (device, inode).
    ///
    /// Only an entry with a matching stored (device, inode) is returned; a
    /// hint that points at a bucket without one yields `None`.
    pub fn lookup_by_inode(&self, dev: u64, ino: u64) -> Option<Arc<MapEntry>> {
        let wanted = DevIno { dev, ino };
        let table = self.table.read();
        let bucket = table
            .ino_index
            .get(ino_hash(dev, ino, self.config.table_size))
            .copied()
            .flatten()?;

        let found = table
            .bucket_entries(bucket)
            .find(|me| me.dev_ino() == Some(wanted))
            .cloned();
        match found {
            Some(_) => self.stats.record_reverse_hit(),
            None => self.stats.record_reverse_stale(),
        }
        found
    }

    /// Record the live (device, inode) on `entry`.
    ///
    /// Only the entry is touched; pair it with
    /// [`set_reverse_index`](Self::set_reverse_index) to make the entry
    /// reachable through [`lookup_by_inode`](Self::lookup_by_inode).
    pub fn set_entry_inode(&self, entry: &MapEntry, dev: u64, ino: u64) {
        entry.set_dev_ino(dev, ino);
        tracing::debug!(key = entry.key(), dev, ino, "recorded entry inode");
    }

    /// Record the (device, inode) of `key`'s first entry and index it.
    pub fn index_entry_inode(&self, key: &str, dev: u64, ino: u64) -> Result<()> {
        let entry = self
            .lookup_exact(key)
            .ok_or_else(|| CacheError::NotFound {
                key: key.to_string(),
            })?;
        self.set_entry_inode(&entry, dev, ino);
        self.set_reverse_index(key, dev, ino);
        Ok(())
    }

    /// Make sure every representative relative entry has a directory.
    ///
    /// For each ungrouped entry or group owner (the wildcard excluded), the
    /// backing directory below `root` is created with the configured ghost
    /// mode if missing, and its (device, inode) is recorded on the entry and
    /// in the reverse index. Absolute keys cannot be ghosted and are
    /// reported and skipped. Failures for one entry do not stop the others.
    /// Returns the number of entries whose directory is now recorded.
    ///
    /// Does nothing unless `ghosting` is set.
    pub fn ghost_reconcile(&self, root: &Path, ghosting: bool) -> usize {
        if !ghosting {
            return 0;
        }

        let mut recorded = 0;
        for id in self.representative_ids() {
            let Some(me) = self.resolve(id) else {
                continue;
            };
            if me.key().starts_with(WILDCARD_KEY) {
                continue;
            }
            if me.is_absolute() {
                tracing::error!(key = me.key(), "invalid key for ghosting: absolute path");
                continue;
            }
            if self.ghost_one(root, &me) {
                recorded += 1;
            }
        }

        tracing::debug!(recorded, "ghost directories reconciled");
        recorded
    }

    fn ghost_one(&self, root: &Path, me: &MapEntry) -> bool {
        let Ok(path) = self.full_path(root, me.key()) else {
            return false;
        };

        let stat = match paths::stat_dev_ino(&path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if let Err(e) = paths::create_ghost_dir(&path, self.config.ghost_dir_mode) {
                    tracing::warn!("mkdir_path {} failed: {}", path.display(), e);
                    return false;
                }
                paths::stat_dev_ino(&path)
            }
            other => other,
        };

        match stat {
            Ok(DevIno { dev, ino }) => {
                self.set_entry_inode(me, dev, ino);
                self.set_reverse_index(me.key(), dev, ino);
                true
            }
            Err(e) => {
                tracing::warn!("stat {} failed: {}", path.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use tempfile::TempDir;

    #[test]
    fn test_reverse_lookup_confirms_match() {
        let cache = MapCache::default();
        cache.add("alice", None, 1).unwrap();
        cache.index_entry_inode("alice", 5, 10).unwrap();

        assert_eq!(cache.lookup_by_inode(5, 10).unwrap().key(), "alice");
        // Same slot, different identity.
        assert!(cache.lookup_by_inode(10, 5).is_none());
        assert!(cache.lookup_by_inode(1, 1).is_none());

        let snapshot = cache.stats().snapshot();
        assert_eq!(snapshot.reverse_hits, 1);
        assert_eq!(snapshot.reverse_stale, 1);
    }

    #[test]
    fn test_colliding_hint_is_overwritten() {
        let cache = MapCache::default();
        cache.add("alice", None, 1).unwrap();
        cache.add("bob", None, 1).unwrap();
        cache.index_entry_inode("alice", 5, 10).unwrap();
        // (7, 8) lands in the same slot as (5, 10).
        cache.index_entry_inode("bob", 7, 8).unwrap();

        assert_eq!(cache.lookup_by_inode(7, 8).unwrap().key(), "bob");
        assert!(cache.lookup_by_inode(5, 10).is_none());
    }

    #[test]
    fn test_index_entry_inode_missing_key() {
        let cache = MapCache::default();
        assert!(cache.index_entry_inode("nobody", 1, 2).unwrap_err().is_not_found());
    }

    #[test]
    fn test_entry_inode_without_hint_is_unreachable() {
        let cache = MapCache::default();
        cache.add("alice", None, 1).unwrap();
        let me = cache.lookup_exact("alice").unwrap();
        cache.set_entry_inode(&me, 5, 10);

        assert_eq!(me.dev_ino(), Some(DevIno { dev: 5, ino: 10 }));
        assert!(cache.lookup_by_inode(5, 10).is_none());

        cache.set_reverse_index("alice", 5, 10);
        assert_eq!(cache.lookup_by_inode(5, 10).unwrap().id(), me.id());
    }

    #[test]
    fn test_ghost_reconcile_creates_directories() {
        let tmp = TempDir::new().unwrap();
        let cache = MapCache::default();
        cache.add("alice", Some("server:/alice"), 1).unwrap();
        cache.add("bob", None, 1).unwrap();
        cache.add("*", Some("server:/&"), 1).unwrap();
        cache.add("/direct", None, 1).unwrap();

        assert_eq!(cache.ghost_reconcile(tmp.path(), true), 2);
        assert!(tmp.path().join("alice").is_dir());
        assert!(tmp.path().join("bob").is_dir());

        let meta = std::fs::metadata(tmp.path().join("alice")).unwrap();
        let me = cache.lookup_exact("alice").unwrap();
        let recorded = me.dev_ino().unwrap();
        assert_eq!(
            cache.lookup_by_inode(recorded.dev, recorded.ino).unwrap().key(),
            "alice"
        );
        use std::os::unix::fs::MetadataExt;
        assert_eq!(recorded.ino, meta.ino());
    }

    #[test]
    fn test_ghost_reconcile_disabled() {
        let tmp = TempDir::new().unwrap();
        let cache = MapCache::default();
        cache.add("alice", None, 1).unwrap();
        assert_eq!(cache.ghost_reconcile(tmp.path(), false), 0);
        assert!(!tmp.path().join("alice").exists());
    }

    #[test]
    fn test_ghost_reconcile_skips_offsets() {
        let tmp = TempDir::new().unwrap();
        let cache = MapCache::new(CacheConfig {
            ghost_dir_mode: 0o755,
            ..Default::default()
        })
        .unwrap();
        cache.add("proj", None, 1).unwrap();
        cache.add_offset("proj", "proj/src", None, 1).unwrap();

        assert_eq!(cache.ghost_reconcile(tmp.path(), true), 1);
        assert!(tmp.path().join("proj").is_dir());
        assert!(!tmp.path().join("proj/src").exists());
    }
}
