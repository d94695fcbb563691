//! Shared helpers for cache integration tests.

#![allow(dead_code)]

use std::path::Path;

use automount_cache::MapCache;

/// Mount point used by tests that never touch the filesystem.
pub const ROOT: &str = "/auto";

pub fn root() -> &'static Path {
    Path::new(ROOT)
}

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A cache with a `/home` multi-mount owning the given offsets.
pub fn home_group(offsets: &[&str]) -> MapCache {
    let cache = MapCache::default();
    cache
        .add("/home", Some("-fstype=nfs server:/home"), 1)
        .expect("add owner");
    for offset in offsets {
        cache
            .add_offset("/home", offset, Some("server:/export"), 1)
            .expect("add offset");
    }
    cache
}
