//! Bucket hashing for keys and (device, inode) pairs.
//!
//! Both hashes are deliberately simple: collisions are expected and are
//! resolved by chaining in the key buckets and by confirmation in the
//! reverse index.

/// Bucket index of a key: the sum of its bytes modulo the table size.
///
/// `table_size` must be non-zero; [`CacheConfig::validate`](crate::CacheConfig::validate)
/// guarantees it for every live table.
#[allow(clippy::cast_possible_truncation)]
pub fn key_hash(key: &str, table_size: usize) -> usize {
    let sum = key
        .bytes()
        .fold(0u64, |acc, byte| acc.wrapping_add(u64::from(byte)));
    (sum % table_size as u64) as usize
}

/// Reverse-index slot of a (device, inode) pair.
#[allow(clippy::cast_possible_truncation)]
pub fn ino_hash(dev: u64, ino: u64, table_size: usize) -> usize {
    (dev.wrapping_add(ino) % table_size as u64) as usize
}
