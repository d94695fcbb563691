//! In-memory map-entry cache for an automount daemon.
//!
//! The cache holds the entries read from automount maps: a key (a
//! directory name below an autofs mount point, or an absolute path for
//! direct maps) and the mount instruction to run when that key is
//! accessed. It is consulted on every lookup, refreshed when map sources
//! are re-read, and swept for stale entries afterwards.
//!
//! # Components
//!
//! - [`MapCache`] - The concurrent table and every operation on it
//! - [`MapEntry`] - A shared handle to one cached entry
//! - [`CacheConfig`] - Table size, path limit and ghost directory mode
//! - [`CacheError`] / [`CacheStatus`] - Typed errors and the classic status triple
//! - [`CacheStats`] - Atomic activity counters
//!
//! # Features beyond plain key lookup
//!
//! - **Duplicate keys**: several entries may share a key; they are kept in
//!   insertion order and walked with [`MapCache::lookup_next`].
//! - **Wildcard fallback**: a missing relative key falls back to the `*`
//!   entry.
//! - **Multi-mount groups**: an owner entry links an ordered list of offset
//!   entries mounted below it; see [`MapCache::add_offset`] and
//!   [`MapCache::get_offset`].
//! - **Reverse index**: best-effort (device, inode) to entry resolution,
//!   always confirmed against the entry itself.
//! - **Ghosting**: [`MapCache::ghost_reconcile`] pre-creates browseable
//!   directories for relative keys.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use automount_cache::{CacheConfig, MapCache};
//!
//! let cache = MapCache::new(CacheConfig::default()).unwrap();
//! cache.add("/home", Some("-fstype=nfs server:/home"), 1).unwrap();
//! cache.add_offset("/home", "/home/alice", Some("server:/alice"), 1).unwrap();
//! cache.add_offset("/home", "/home/bob", Some("server:/bob"), 1).unwrap();
//!
//! let owner = cache.lookup("/home").unwrap();
//! let offsets: Vec<String> = cache.offsets("/", "/home".len(), &owner).collect();
//! assert_eq!(offsets, ["/alice", "/bob"]);
//!
//! // Offsets must be removed before their owner.
//! let root = Path::new("/net");
//! assert!(cache.delete(root, "/home", false).is_err());
//! assert_eq!(cache.delete_group(root, "/home").unwrap(), 0);
//! cache.delete(root, "/home", false).unwrap();
//! ```

#![warn(missing_docs)]

mod arena;
pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod hash;
pub mod paths;
pub mod stats;
pub mod testing;

pub use cache::{MapCache, OffsetCursor, Offsets};
pub use config::CacheConfig;
pub use entry::{DevIno, EntryId, GroupRole, MapEntry, WILDCARD_KEY};
pub use error::{CacheError, CacheStatus, Result, UpdateOutcome};
pub use stats::{CacheStats, CacheStatsSnapshot};
