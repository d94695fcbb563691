//! Multi-mount offset groups.
//!
//! A multi-mount owner keeps an ordered list of the offsets mounted below
//! it. The list is held in path order (keys compared component by
//! component), so every offset sorts after its parent and an offset's
//! descendants follow it contiguously. [`MapCache::get_offset`] relies on
//! that to report only the top-level offsets under a prefix.
//!
//! The list is guarded by the owner's entry lock. Group mutations on
//! different owners proceed concurrently; mutations of the same group are
//! serialized.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use super::{MapCache, Table};
use crate::entry::{EntryId, MapEntry};
use crate::error::{CacheError, Result};

/// Path order: keys compared as sequences of `/`-separated components.
///
/// Unlike plain byte order this keeps `/a/b` between `/a` and `/a-b`.
pub(crate) fn path_order(a: &str, b: &str) -> Ordering {
    a.split('/').cmp(b.split('/'))
}

/// Link `entry` into an ordered offset list.
///
/// Fails with the id already holding the key if an offset with the same key
/// is present. Ids that no longer resolve are pruned on the way.
fn link_ordered(
    table: &Table,
    offsets: &mut Vec<EntryId>,
    entry: &MapEntry,
) -> std::result::Result<(), EntryId> {
    offsets.retain(|id| table.entry(*id).is_some());

    let key = entry.key();
    let search = offsets.binary_search_by(|id| {
        let sibling = table.entry(*id).map_or("", |me| me.key());
        path_order(sibling, key)
    });
    match search {
        Ok(found) => Err(offsets[found]),
        Err(pos) => {
            offsets.insert(pos, entry.id());
            Ok(())
        }
    }
}

/// Position in an owner's offset list for [`MapCache::get_offset`].
///
/// The default cursor starts before the first offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OffsetCursor {
    pos: Option<usize>,
}

impl OffsetCursor {
    /// A cursor positioned before the first offset.
    pub fn start() -> Self {
        Self::default()
    }

    fn next_index(self) -> usize {
        self.pos.map_or(0, |pos| pos + 1)
    }
}

/// The part of `key` from byte `start` on, if `start` is a char boundary
/// within the key.
fn tail(key: &str, start: usize) -> Option<&str> {
    key.get(start..)
}

/// Find the next top-level offset under `prefix` in a path-ordered key list.
///
/// `start` is the byte offset into each key where the prefix comparison
/// begins, which lets callers skip a shared mount-point prefix. Keys for
/// which `start` is past the end or not a char boundary are skipped. A
/// prefix of `"/"` (or empty) denotes the root, where every offset
/// qualifies.
fn next_offset(
    keys: &[&str],
    prefix: &str,
    start: usize,
    cursor: OffsetCursor,
) -> Option<(String, OffsetCursor)> {
    let plen = prefix.len();
    let skip = if plen <= 1 { 0 } else { plen };

    let mut next = cursor.next_index();
    let mut pos = cursor.pos;
    let mut found = None;
    while let Some(key) = keys.get(next) {
        pos = Some(next);
        next += 1;
        let Some(rest) = tail(key, start) else {
            continue;
        };
        if rest.len() <= plen || !rest.starts_with(prefix) {
            continue;
        }
        if rest.as_bytes().get(skip) != Some(&b'/') {
            continue;
        }
        found = Some(&rest[skip..]);
        break;
    }

    let offset = found?;
    let len = offset.len();

    // Step over the descendants of the offset just found.
    while let Some(key) = keys.get(next) {
        let Some(rest) = tail(key, start) else {
            break;
        };
        if rest.len() <= plen + len {
            break;
        }
        let Some(sub) = rest.get(skip..) else {
            break;
        };
        let sub = sub.as_bytes();
        if sub[0] != b'/' || sub.len() == len + 1 {
            break;
        }
        if sub[len] != b'/' || sub[..len] != *offset.as_bytes() {
            break;
        }
        pos = Some(next);
        next += 1;
    }

    Some((offset.to_string(), OffsetCursor { pos }))
}

/// Iterator over the top-level offsets of a group under a prefix.
///
/// Created by [`MapCache::offsets`].
#[derive(Debug)]
pub struct Offsets<'a> {
    cache: &'a MapCache,
    owner: Arc<MapEntry>,
    prefix: String,
    start: usize,
    cursor: OffsetCursor,
    done: bool,
}

impl Iterator for Offsets<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self
            .cache
            .get_offset(&self.prefix, self.start, &self.owner, self.cursor)
        {
            Some((offset, cursor)) => {
                self.cursor = cursor;
                Some(offset)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl MapCache {
    /// Add or refresh the offset `offset_key` and link it into the group
    /// owned by `owner_key`.
    ///
    /// The owner must already exist. Linking an offset whose key is already
    /// in the group only refreshes its mount instruction. An offset that
    /// belongs to another group is refused with [`CacheError::Guarded`].
    pub fn add_offset(
        &self,
        owner_key: &str,
        offset_key: &str,
        mapent: Option<&str>,
        age: u64,
    ) -> Result<()> {
        let owner = self
            .lookup_exact(owner_key)
            .ok_or_else(|| CacheError::NotFound {
                key: owner_key.to_string(),
            })?;
        if offset_key == owner_key {
            return Err(CacheError::InvalidKey {
                key: offset_key.to_string(),
            });
        }

        self.update(offset_key, mapent, age)?;
        let entry = self
            .lookup_exact(offset_key)
            .ok_or_else(|| CacheError::NotFound {
                key: offset_key.to_string(),
            })?;

        if owner.state().group.member_of == Some(entry.id()) {
            tracing::error!(owner_key, offset_key, "offset would own its own owner");
            return Err(CacheError::InvalidKey {
                key: offset_key.to_string(),
            });
        }

        {
            let mut state = entry.state();
            match state.group.member_of {
                Some(current) if current == owner.id() && state.group.attached => {
                    tracing::debug!(owner_key, offset_key, "offset already linked");
                    return Ok(());
                }
                Some(current) if current != owner.id() => {
                    tracing::error!(
                        owner_key,
                        offset_key,
                        "offset already belongs to another multi-mount group"
                    );
                    return Err(CacheError::Guarded {
                        key: offset_key.to_string(),
                    });
                }
                _ => {
                    state.group.member_of = Some(owner.id());
                    state.group.attached = true;
                }
            }
        }

        let linked = {
            let table = self.table.read();
            if !table.entries.contains(entry.id()) || !table.entries.contains(owner.id()) {
                None
            } else {
                let mut state = owner.state();
                state.group.owns_group = true;
                Some(link_ordered(&table, &mut state.group.offsets, &entry))
            }
        };

        match linked {
            Some(Ok(())) => {
                tracing::debug!(owner_key, offset_key, "linked offset");
                Ok(())
            }
            // Re-attached while its id was still listed.
            Some(Err(existing)) if existing == entry.id() => Ok(()),
            Some(Err(_)) => {
                let mut state = entry.state();
                state.group.member_of = None;
                state.group.attached = false;
                Ok(())
            }
            None => {
                let mut state = entry.state();
                state.group.member_of = None;
                state.group.attached = false;
                Err(CacheError::NotFound {
                    key: offset_key.to_string(),
                })
            }
        }
    }

    /// Find the group offset whose key, from byte `start` on, equals the
    /// prefix joined with `offset`.
    ///
    /// `start` must fall on a char boundary of a sibling key for that key
    /// to match.
    ///
    /// A prefix of `"/"` (or shorter) is the root and contributes nothing.
    pub fn lookup_offset(
        &self,
        prefix: &str,
        offset: &str,
        start: usize,
        owner: &MapEntry,
    ) -> Option<Arc<MapEntry>> {
        let wanted = if prefix.len() > 1 {
            format!("{prefix}{offset}")
        } else {
            offset.to_string()
        };

        let table = self.table.read();
        let state = owner.state();
        state
            .group
            .offsets
            .iter()
            .filter_map(|id| table.entry(*id))
            .find(|me| tail(me.key(), start) == Some(wanted.as_str()))
            .cloned()
    }

    /// Next top-level offset under `prefix`, resuming after `cursor`.
    ///
    /// Returns the offset relative to `prefix` (starting with `/`) and the
    /// cursor to resume from. Offsets nested below a returned offset are
    /// skipped. `start` is the byte offset into each sibling key where the
    /// comparison begins; keys where it is not a char boundary are skipped,
    /// so every returned offset is found again by
    /// [`lookup_offset`](Self::lookup_offset).
    pub fn get_offset(
        &self,
        prefix: &str,
        start: usize,
        owner: &MapEntry,
        cursor: OffsetCursor,
    ) -> Option<(String, OffsetCursor)> {
        let table = self.table.read();
        let state = owner.state();
        let keys: Vec<&str> = state
            .group
            .offsets
            .iter()
            .filter_map(|id| table.entry(*id))
            .map(|me| me.key())
            .collect();
        next_offset(&keys, prefix, start, cursor)
    }

    /// Iterate over the top-level offsets under `prefix`.
    ///
    /// Each step re-reads the group, so concurrent changes may be observed.
    pub fn offsets(&self, prefix: &str, start: usize, owner: &Arc<MapEntry>) -> Offsets<'_> {
        Offsets {
            cache: self,
            owner: Arc::clone(owner),
            prefix: prefix.to_string(),
            start,
            cursor: OffsetCursor::start(),
            done: false,
        }
    }

    /// Tear down the group owned by `owner_key`.
    ///
    /// Each offset is detached and deleted. Offsets that fail to delete
    /// (typically owners of a nested, still populated group) are re-linked
    /// and counted; the owner keeps ownership while any remain. Calling
    /// this on an entry that does not own a group does nothing.
    pub fn delete_group(&self, root: &Path, owner_key: &str) -> Result<usize> {
        let owner = self
            .lookup_exact(owner_key)
            .ok_or_else(|| CacheError::NotFound {
                key: owner_key.to_string(),
            })?;

        // The ids stay in the owner's list until each sibling is gone, so the
        // owner remains guarded against delete and clean for the whole pass.
        let siblings: Vec<Arc<MapEntry>> = {
            let table = self.table.read();
            let state = owner.state();
            if !state.group.owns_group {
                tracing::debug!(owner_key, "not a multi-mount owner");
                return Ok(0);
            }
            state
                .group
                .offsets
                .iter()
                .filter_map(|id| table.entry(*id).cloned())
                .collect()
        };

        let mut left = 0;
        for sibling in siblings {
            sibling.state().group.attached = false;
            match self.delete(root, sibling.key(), false) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::debug!(key = sibling.key(), error = %e, "offset left attached");
                    sibling.state().group.attached = true;
                    left += 1;
                    continue;
                }
            }
            owner
                .state()
                .group
                .offsets
                .retain(|id| *id != sibling.id());
        }

        {
            let table = self.table.read();
            let mut state = owner.state();
            state.group.offsets.retain(|id| table.entry(*id).is_some());
            state.group.owns_group = !state.group.offsets.is_empty();
        }

        if left > 0 {
            tracing::warn!(owner_key, left, "multi-mount group not fully removed");
        } else {
            tracing::debug!(owner_key, "multi-mount group removed");
        }
        Ok(left)
    }

    /// Keys of the offsets in the group owned by `owner_key`, in path order.
    ///
    /// `None` if the key is missing or does not own a group.
    pub fn group_offsets(&self, owner_key: &str) -> Option<Vec<String>> {
        let owner = self.lookup_exact(owner_key)?;
        let table = self.table.read();
        let state = owner.state();
        if !state.group.owns_group {
            return None;
        }
        Some(
            state
                .group
                .offsets
                .iter()
                .filter_map(|id| table.entry(*id))
                .map(|me| me.key().to_string())
                .collect(),
        )
    }

    /// Log the offsets of a group at info level and return them.
    pub fn dump_group(&self, owner_key: &str) -> Vec<String> {
        let offsets = self.group_offsets(owner_key).unwrap_or_default();
        for key in &offsets {
            tracing::info!(owner = owner_key, offset = %key, "multi-mount offset");
        }
        offsets
    }
}
