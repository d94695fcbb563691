//! Key generators for cache tests.
//!
//! The byte-sum hash makes collisions easy to produce on purpose: any
//! permutation of a key lands in the same bucket.

use rand::Rng;
use rand::seq::SliceRandom;

/// Deterministic, distinct relative keys `key0`, `key1`, ...
pub fn entry_keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("key{i}")).collect()
}

/// Random lowercase relative key of `len` characters.
pub fn random_key(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}

/// Distinct keys that all hash to the same bucket.
///
/// Built from rotations of one base word, so their byte sums are equal.
/// At most as many keys as the base word has distinct rotations.
pub fn colliding_keys(count: usize) -> Vec<String> {
    let base = "abcdefghij";
    (0..count.min(base.len()))
        .map(|shift| format!("{}{}", &base[shift..], &base[..shift]))
        .collect()
}

/// A shuffled multi-mount offset tree below `owner`.
///
/// Produces `width` top-level offsets, each with `depth` nested levels
/// below it, e.g. `/owner/d0`, `/owner/d0/d0`, `/owner/d0/d0/d0`. The
/// order is randomized so tests exercise ordered insertion.
pub fn offset_tree(owner: &str, width: usize, depth: usize) -> Vec<String> {
    let mut offsets = Vec::with_capacity(width * (depth + 1));
    for top in 0..width {
        let mut path = format!("{owner}/d{top}");
        offsets.push(path.clone());
        for level in 0..depth {
            path.push_str(&format!("/d{level}"));
            offsets.push(path.clone());
        }
    }
    offsets.shuffle(&mut rand::rng());
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::key_hash;

    #[test]
    fn test_colliding_keys_share_bucket() {
        let keys = colliding_keys(5);
        assert_eq!(keys.len(), 5);
        let bucket = key_hash(&keys[0], 77);
        assert!(keys.iter().all(|k| key_hash(k, 77) == bucket));

        let mut unique = keys.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), keys.len());
    }

    #[test]
    fn test_random_key() {
        let key = random_key(12);
        assert_eq!(key.len(), 12);
        assert!(key.bytes().all(|b| b.is_ascii_lowercase()));
    }

    #[test]
    fn test_offset_tree_size() {
        let offsets = offset_tree("/m", 3, 2);
        assert_eq!(offsets.len(), 9);
        assert!(offsets.contains(&"/m/d1/d0/d1".to_string()));
    }
}
