//! Slot arena owning every live entry of a table.
//!
//! Buckets and multi-mount sibling lists refer to entries by [`EntryId`]
//! rather than by pointer. Removing an entry bumps its slot's generation, so
//! any id still held elsewhere stops resolving instead of dangling.
//!
//! # Entry Lifecycle
//!
//! 1. **Insert**: reserve capacity, then build the entry with its fresh id
//! 2. **Get**: resolve an id to a shared handle
//! 3. **Remove**: unlink the slot and hand the last table reference back

use std::sync::Arc;

use crate::entry::{EntryId, MapEntry};
use crate::error::Result;

#[derive(Debug)]
struct Slot {
    generation: u32,
    entry: Option<Arc<MapEntry>>,
}

/// Generational arena of `Arc<MapEntry>`.
///
/// Not synchronized on its own; it lives inside the table's structural lock.
#[derive(Debug, Default)]
pub(crate) struct EntryArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl EntryArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert the entry produced by `build` for the id it will occupy.
    ///
    /// Capacity is reserved before `build` runs, so an allocation failure
    /// leaves the arena untouched.
    pub(crate) fn insert_with<F>(&mut self, build: F) -> Result<Arc<MapEntry>>
    where
        F: FnOnce(EntryId) -> MapEntry,
    {
        if let Some(slot) = self.free.pop() {
            let cell = &mut self.slots[slot as usize];
            // Generations start at 1 and skip 0 on wrap-around.
            cell.generation = cell.generation.checked_add(1).unwrap_or(1);
            let id = EntryId {
                slot,
                generation: cell.generation,
            };
            let entry = Arc::new(build(id));
            cell.entry = Some(Arc::clone(&entry));
            self.len += 1;
            return Ok(entry);
        }

        self.slots.try_reserve(1)?;
        self.free.try_reserve(self.slots.len() + 1 - self.free.len())?;
        #[allow(clippy::cast_possible_truncation)]
        let slot = self.slots.len() as u32;
        let id = EntryId {
            slot,
            generation: 1,
        };
        let entry = Arc::new(build(id));
        self.slots.push(Slot {
            generation: 1,
            entry: Some(Arc::clone(&entry)),
        });
        self.len += 1;
        Ok(entry)
    }

    /// Resolve an id, if its entry is still live.
    pub(crate) fn get(&self, id: EntryId) -> Option<&Arc<MapEntry>> {
        let cell = self.slots.get(id.slot as usize)?;
        if cell.generation != id.generation {
            return None;
        }
        cell.entry.as_ref()
    }

    /// Remove an entry and return the table's reference to it.
    pub(crate) fn remove(&mut self, id: EntryId) -> Option<Arc<MapEntry>> {
        let cell = self.slots.get_mut(id.slot as usize)?;
        if cell.generation != id.generation {
            return None;
        }
        let entry = cell.entry.take()?;
        // Capacity for this push was reserved when the slot was created.
        self.free.push(id.slot);
        self.len -= 1;
        Some(entry)
    }

    pub(crate) fn contains(&self, id: EntryId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every entry. Outstanding handles stay readable but their ids
    /// no longer resolve.
    ///
    /// Slots are kept and all become free, so their generations carry over
    /// and a reused slot never revives an id handed out before the clear.
    pub(crate) fn clear(&mut self) {
        for cell in &mut self.slots {
            cell.entry = None;
        }
        self.free.clear();
        // Capacity for every slot was reserved as the slots were created.
        #[allow(clippy::cast_possible_truncation)]
        self.free.extend((0..self.slots.len() as u32).rev());
        self.len = 0;
    }
}
