//! Testing utilities for cache unit and integration tests.
//!
//! - **Generators**: map keys, colliding keys and multi-mount offset trees
//! - **Assertions**: group ordering and candidate-order checks with readable
//!   failure messages
//!
//! # Usage
//!
//! ```
//! use automount_cache::MapCache;
//! use automount_cache::testing::{assert_candidates, colliding_keys};
//!
//! let cache = MapCache::default();
//! let keys = colliding_keys(3);
//! for key in &keys {
//!     cache.add(key, Some("server:/x"), 1).unwrap();
//! }
//! cache.add(&keys[0], Some("server:/y"), 1).unwrap();
//! assert_candidates(&cache, &keys[0], &["server:/x", "server:/y"]);
//! ```

pub mod assertions;
pub mod generators;

pub use assertions::{assert_candidates, assert_parent_before_child};
pub use generators::{colliding_keys, entry_keys, offset_tree, random_key};
