//! Custom assertions for cache tests.

use crate::MapCache;

/// Assert that an offset list never names a child before its parent.
pub fn assert_parent_before_child(offsets: &[String], context: &str) {
    for (i, key) in offsets.iter().enumerate() {
        let child_prefix = format!("{key}/");
        if let Some(early) = offsets[..i].iter().find(|k| k.starts_with(&child_prefix)) {
            panic!("{context}: offset {early} listed before its parent {key}\n  order: {offsets:?}");
        }
    }
}

/// Assert the mount instructions found for `key`, in candidate order.
///
/// Walks [`MapCache::lookup_exact`] followed by [`MapCache::lookup_next`].
pub fn assert_candidates(cache: &MapCache, key: &str, expected: &[&str]) {
    let mut actual = Vec::new();
    let mut current = cache.lookup_exact(key);
    while let Some(me) = current {
        actual.push(me.mapent().unwrap_or_default());
        current = cache.lookup_next(&me);
    }
    assert_eq!(actual, expected, "candidates for key {key:?}");
}
