//! Map entries and their per-entry state.
//!
//! A [`MapEntry`] is shared as an `Arc` handle. The key and id never change
//! after creation; everything else lives behind the entry's own mutex and
//! may be mutated while other threads read different entries under the
//! table's structural read lock.

use std::fmt;

use parking_lot::{Mutex, MutexGuard};

/// The wildcard key consulted when an indirect-map lookup misses.
pub const WILDCARD_KEY: &str = "*";

/// Stable handle to an entry slot in the table.
///
/// The generation distinguishes successive occupants of the same slot, so an
/// id taken before a delete never resolves to a later entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

/// Device and inode of the live directory backing an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevIno {
    /// Device number.
    pub dev: u64,
    /// Inode number.
    pub ino: u64,
}

/// How an entry takes part in a multi-mount group.
///
/// Membership wins over ownership: an offset that owns a nested group of its
/// own still reports [`GroupRole::Member`]. Use [`MapEntry::owns_group`] to
/// ask about ownership alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    /// Not part of any group.
    Ungrouped,
    /// Owns a group (the root of a multi-mount).
    Owner,
    /// An offset inside the group owned by the given entry.
    Member {
        /// Id of the owning entry.
        owner: EntryId,
    },
}

/// Multi-mount linkage of one entry.
#[derive(Debug, Default)]
pub(crate) struct GroupLink {
    /// Owner of the group this entry is an offset of.
    pub(crate) member_of: Option<EntryId>,
    /// Whether this member is currently linked into its owner's offsets.
    pub(crate) attached: bool,
    /// Whether this entry owns a group.
    pub(crate) owns_group: bool,
    /// Ordered sibling offsets; only populated on an owner.
    pub(crate) offsets: Vec<EntryId>,
}

/// Mutable part of an entry, guarded by the entry lock.
#[derive(Debug)]
pub(crate) struct EntryState {
    pub(crate) mapent: Option<String>,
    pub(crate) age: u64,
    pub(crate) dev_ino: Option<DevIno>,
    pub(crate) group: GroupLink,
}

impl EntryState {
    /// An entry that is still linked into a populated group may not be
    /// removed from the table.
    pub(crate) fn is_guarded(&self) -> bool {
        (self.group.member_of.is_some() && self.group.attached) || !self.group.offsets.is_empty()
    }
}

/// One cached map entry: a key and its (optional) mount instruction.
pub struct MapEntry {
    id: EntryId,
    key: String,
    state: Mutex<EntryState>,
}

impl MapEntry {
    pub(crate) fn new(id: EntryId, key: String, mapent: Option<String>, age: u64) -> Self {
        Self {
            id,
            key,
            state: Mutex::new(EntryState {
                mapent,
                age,
                dev_ino: None,
                group: GroupLink::default(),
            }),
        }
    }

    /// The entry's table id.
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// The lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Copy of the stored mount instruction.
    pub fn mapent(&self) -> Option<String> {
        self.state.lock().mapent.clone()
    }

    /// Generation marker of the last confirmed validity.
    pub fn age(&self) -> u64 {
        self.state.lock().age
    }

    /// (device, inode) of the backing directory, once known.
    pub fn dev_ino(&self) -> Option<DevIno> {
        self.state.lock().dev_ino
    }

    /// Record the (device, inode) of the live directory backing this entry.
    pub fn set_dev_ino(&self, dev: u64, ino: u64) {
        self.state.lock().dev_ino = Some(DevIno { dev, ino });
    }

    /// Whether this is the wildcard entry.
    pub fn is_wildcard(&self) -> bool {
        self.key == WILDCARD_KEY
    }

    /// Whether the key is an absolute path (a direct-map key).
    pub fn is_absolute(&self) -> bool {
        self.key.starts_with('/')
    }

    /// This entry's place in a multi-mount group.
    pub fn group_role(&self) -> GroupRole {
        let state = self.state.lock();
        match (state.group.member_of, state.group.owns_group) {
            (Some(owner), _) => GroupRole::Member { owner },
            (None, true) => GroupRole::Owner,
            (None, false) => GroupRole::Ungrouped,
        }
    }

    /// Whether this entry owns a multi-mount group.
    pub fn owns_group(&self) -> bool {
        self.state.lock().group.owns_group
    }

    /// Whether the entry stands for its multi-mount tree: ungrouped entries
    /// and group owners do, offset members do not.
    pub fn is_representative(&self) -> bool {
        self.state.lock().group.member_of.is_none()
    }

    /// Whether removing the entry is currently blocked by group membership.
    pub fn is_guarded(&self) -> bool {
        self.state.lock().is_guarded()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock()
    }
}

impl fmt::Debug for MapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MapEntry")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("mapent", &state.mapent)
            .field("age", &state.age)
            .field("dev_ino", &state.dev_ino)
            .finish_non_exhaustive()
    }
}
