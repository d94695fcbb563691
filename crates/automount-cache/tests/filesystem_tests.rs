//! Cache operations that touch backing directories.

mod common;

use std::fs;
use std::os::unix::fs::MetadataExt;

use automount_cache::{CacheConfig, CacheError, MapCache};
use common::init_tracing;
use tempfile::TempDir;

fn writable_ghosts() -> MapCache {
    MapCache::new(CacheConfig {
        ghost_dir_mode: 0o755,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_ghost_then_reverse_lookup() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let cache = MapCache::default();
    for key in ["alice", "bob"] {
        cache.add(key, Some("server:/x"), 1).unwrap();
    }

    assert_eq!(cache.ghost_reconcile(tmp.path(), true), 2);
    for key in ["alice", "bob"] {
        let meta = fs::metadata(tmp.path().join(key)).unwrap();
        let me = cache.lookup_by_inode(meta.dev(), meta.ino()).unwrap();
        assert_eq!(me.key(), key);
    }
}

#[test]
fn test_ghost_reconcile_reuses_existing_directory() {
    let tmp = TempDir::new().unwrap();
    let existing = tmp.path().join("alice");
    fs::create_dir(&existing).unwrap();
    fs::write(existing.join("marker"), b"x").unwrap();

    let cache = MapCache::default();
    cache.add("alice", None, 1).unwrap();
    assert_eq!(cache.ghost_reconcile(tmp.path(), true), 1);
    assert!(existing.join("marker").exists());
}

#[test]
fn test_delete_removes_backing_directory() {
    let tmp = TempDir::new().unwrap();
    let cache = writable_ghosts();
    cache.add("alice", None, 1).unwrap();
    cache.ghost_reconcile(tmp.path(), true);
    assert!(tmp.path().join("alice").is_dir());

    cache.delete(tmp.path(), "alice", true).unwrap();
    assert!(!tmp.path().join("alice").exists());
    assert!(tmp.path().exists());
}

#[test]
fn test_delete_without_removal_keeps_directory() {
    let tmp = TempDir::new().unwrap();
    let cache = writable_ghosts();
    cache.add("alice", None, 1).unwrap();
    cache.ghost_reconcile(tmp.path(), true);

    cache.delete(tmp.path(), "alice", false).unwrap();
    assert!(tmp.path().join("alice").is_dir());
}

#[test]
fn test_clean_removes_expired_directories() {
    let tmp = TempDir::new().unwrap();
    let cache = writable_ghosts();
    cache.add("old", None, 1).unwrap();
    cache.add("fresh", None, 5).unwrap();
    cache.ghost_reconcile(tmp.path(), true);

    assert_eq!(cache.clean(tmp.path(), 3), 1);
    assert!(!tmp.path().join("old").exists());
    assert!(tmp.path().join("fresh").is_dir());
}

#[test]
fn test_clean_keeps_non_empty_directory() {
    let tmp = TempDir::new().unwrap();
    let cache = MapCache::default();
    cache.add("busy", None, 1).unwrap();
    let dir = tmp.path().join("busy");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("file"), b"in use").unwrap();

    assert_eq!(cache.clean(tmp.path(), 3), 1);
    assert!(cache.lookup_exact("busy").is_none());
    assert!(dir.join("file").exists());
}

#[test]
fn test_config_file_drives_limits() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("cache.toml");
    fs::write(&path, "table_size = 13\nkey_max_len = 16\n").unwrap();

    let config = CacheConfig::load(&path).unwrap();
    let cache = MapCache::new(config).unwrap();
    assert_eq!(cache.config().table_size, 13);

    cache.add("a-rather-long-key", None, 1).unwrap();
    let err = cache
        .delete(tmp.path(), "a-rather-long-key", false)
        .unwrap_err();
    assert!(matches!(err, CacheError::PathTooLong { max: 16, .. }));
}
