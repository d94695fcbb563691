//! Visiting every representative entry.

use std::sync::Arc;

use super::MapCache;
use crate::entry::MapEntry;

impl MapCache {
    /// Call `visit` for each ungrouped entry and each group owner.
    ///
    /// The set of candidates is snapshotted first; the structural lock is
    /// not held while `visit` runs, so it may call back into the cache.
    /// Entries removed after the snapshot are skipped. Returns how many
    /// visits reported success.
    pub fn enumerate<F>(&self, mut visit: F) -> usize
    where
        F: FnMut(&Arc<MapEntry>) -> bool,
    {
        let mut visited = 0;
        for id in self.representative_ids() {
            let Some(me) = self.resolve(id) else {
                continue;
            };
            if !me.is_representative() {
                continue;
            }
            if visit(&me) {
                visited += 1;
            }
        }
        visited
    }
}
