//! End-to-end behaviour of the map-entry cache.
//!
//! Covers the guarantees map readers and the mount path rely on:
//! - candidate order for duplicate keys
//! - wildcard fallback for relative keys only
//! - refresh semantics of `update`
//! - multi-mount group ordering, traversal and teardown
//! - reverse-index confirmation

mod common;

use automount_cache::testing::{
    assert_candidates, assert_parent_before_child, colliding_keys, offset_tree,
};
use automount_cache::{CacheConfig, CacheError, CacheStatus, GroupRole, MapCache, UpdateOutcome};
use common::{home_group, init_tracing, root};

#[test]
fn test_candidate_order_survives_collisions() {
    init_tracing();
    let cache = MapCache::default();
    let keys = colliding_keys(4);

    cache.add(&keys[0], Some("v1"), 1).unwrap();
    cache.add(&keys[1], Some("x"), 1).unwrap();
    cache.add(&keys[0], Some("v2"), 1).unwrap();
    cache.add(&keys[2], Some("y"), 1).unwrap();
    cache.add(&keys[0], Some("v3"), 1).unwrap();
    cache.add(&keys[3], Some("z"), 1).unwrap();

    assert_candidates(&cache, &keys[0], &["v1", "v2", "v3"]);
    assert_candidates(&cache, &keys[1], &["x"]);
}

#[test]
fn test_wildcard_only_for_relative_keys() {
    let cache = MapCache::default();
    assert!(cache.lookup("anything").is_none());

    cache.add("*", Some("server:/export/&"), 1).unwrap();
    assert_eq!(cache.lookup("anything").unwrap().key(), "*");
    assert!(cache.lookup("/direct/key").is_none());
}

#[test]
fn test_update_then_refresh_reports_unchanged() {
    let cache = MapCache::default();
    assert_eq!(cache.update("k", Some("v"), 1).unwrap(), UpdateOutcome::Updated);
    assert_eq!(cache.update("k", Some("v"), 2).unwrap(), UpdateOutcome::Unchanged);
    assert_eq!(cache.lookup("k").unwrap().age(), 2);

    // Collaborators see the classic status codes.
    assert_eq!(CacheStatus::from(cache.update("k", Some("v"), 3)), CacheStatus::Ok);
    assert_eq!(CacheStatus::from(cache.update("k", Some("w"), 4)), CacheStatus::Updated);
}

#[test]
fn test_map_reread_and_clean_cycle() {
    let cache = MapCache::default();
    for key in ["alice", "bob", "carol"] {
        cache.update(key, Some("server:/x"), 1).unwrap();
    }

    // A re-read at age 2 no longer lists bob.
    for key in ["alice", "carol", "dave"] {
        cache.update(key, Some("server:/x"), 2).unwrap();
    }
    assert_eq!(cache.clean(root(), 2), 1);

    assert!(cache.lookup_exact("bob").is_none());
    for key in ["alice", "carol", "dave"] {
        assert!(cache.lookup_exact(key).is_some(), "{key} should survive");
    }
}

#[test]
fn test_group_listing_is_path_ordered() {
    let cache = home_group(&[]);
    for offset in offset_tree("/home", 4, 3) {
        cache.add_offset("/home", &offset, None, 1).unwrap();
    }

    let offsets = cache.group_offsets("/home").unwrap();
    assert_eq!(offsets.len(), 16);
    assert_parent_before_child(&offsets, "offset tree");
}

#[test]
fn test_get_offset_end_to_end() {
    let cache = home_group(&["/home/alice"]);
    let owner = cache.lookup("/home").unwrap();

    let offsets: Vec<String> = cache.offsets("/", "/home".len(), &owner).collect();
    assert_eq!(offsets, ["/alice"]);

    let found = cache
        .lookup_offset("/", "/alice", "/home".len(), &owner)
        .unwrap();
    assert_eq!(found.key(), "/home/alice");
    assert_eq!(found.group_role(), GroupRole::Member { owner: owner.id() });
}

#[test]
fn test_owner_and_members_guarded_until_group_removed() {
    let cache = home_group(&["/home/alice", "/home/bob"]);

    let err = cache.delete(root(), "/home", false).unwrap_err();
    assert!(matches!(err, CacheError::Guarded { .. }));
    let err = cache.delete(root(), "/home/alice", false).unwrap_err();
    assert!(err.is_guarded());
    assert_eq!(cache.len(), 3);

    // Age sweeps leave the group alone.
    assert_eq!(cache.clean(root(), 100), 0);
    assert_eq!(cache.len(), 3);

    assert_eq!(cache.delete_group(root(), "/home").unwrap(), 0);
    cache.delete(root(), "/home", false).unwrap();
    assert!(cache.is_empty());
}

#[test]
fn test_clean_after_group_removed_evicts_owner() {
    let cache = home_group(&["/home/alice"]);
    cache.delete_group(root(), "/home").unwrap();
    assert_eq!(cache.clean(root(), 100), 1);
    assert!(cache.is_empty());
}

#[test]
fn test_reverse_index_confirms_identity() {
    let cache = MapCache::default();
    cache.add("alice", None, 1).unwrap();
    cache.add("bob", None, 1).unwrap();

    // (5, 10) and (10, 5) share a reverse-index slot.
    cache.index_entry_inode("alice", 5, 10).unwrap();
    assert_eq!(cache.lookup_by_inode(5, 10).unwrap().key(), "alice");
    assert!(cache.lookup_by_inode(10, 5).is_none());
}

#[test]
fn test_small_table_behaves_like_large() {
    let small = MapCache::new(CacheConfig::with_table_size(1)).unwrap();
    let large = MapCache::default();
    for cache in [&small, &large] {
        cache.add("*", Some("wild"), 1).unwrap();
        cache.add("alice", Some("a1"), 1).unwrap();
        cache.add("alice", Some("a2"), 1).unwrap();
        cache.add("bob", Some("b"), 1).unwrap();
    }

    for cache in [&small, &large] {
        assert_candidates(cache, "alice", &["a1", "a2"]);
        assert_eq!(cache.lookup("carol").unwrap().mapent().as_deref(), Some("wild"));
        assert_eq!(cache.len(), 4);
    }
}

#[test]
fn test_enumerate_visits_representatives() {
    let cache = home_group(&["/home/alice", "/home/bob"]);
    cache.add("standalone", None, 1).unwrap();

    let mut seen = Vec::new();
    let visited = cache.enumerate(|me| {
        seen.push(me.key().to_string());
        true
    });
    seen.sort();
    assert_eq!(visited, 2);
    assert_eq!(seen, ["/home", "standalone"]);
}
