//! Error types and collaborator status codes for the map-entry cache.
//!
//! Every fallible cache operation returns [`Result`]. Lookup and mount
//! collaborators that only care about the classic three-valued outcome can
//! collapse any result into a [`CacheStatus`].

use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

/// Errors produced by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Memory for a key, mount instruction or bucket slot could not be reserved.
    #[error("allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    /// No entry exists for the key.
    #[error("no cache entry for key {key:?}")]
    NotFound {
        /// The key that was looked up.
        key: String,
    },

    /// The entry is part of a populated multi-mount group and must be
    /// removed leaf-to-root through the group path.
    #[error("cache entry {key:?} is guarded by a multi-mount group")]
    Guarded {
        /// The key of the guarded entry.
        key: String,
    },

    /// A computed path exceeds the configured maximum length.
    #[error("path too long: {len} bytes exceeds maximum of {max}")]
    PathTooLong {
        /// Length the path would have had, including the terminator.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The key is not valid for this operation.
    #[error("invalid key {key:?}")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },

    /// The cache was released and has not been re-initialized.
    #[error("map cache is not initialized")]
    Uninitialized,

    /// The configuration failed validation.
    #[error("invalid cache configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with it.
        reason: String,
    },

    /// Filesystem error surfaced to the caller.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Outcome of a successful [`MapCache::update`](crate::MapCache::update).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A new entry was added or the stored mount instruction changed.
    Updated,
    /// The stored mount instruction already matched; only the age moved.
    Unchanged,
}

/// Three-valued status returned to lookup and mount collaborators.
///
/// Collaborators branch only on these codes, so any [`Result`] from the
/// cache converts into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// The operation succeeded without changing a mount instruction.
    Ok,
    /// The operation added an entry or changed a mount instruction.
    Updated,
    /// The operation failed.
    Fail,
}

impl From<()> for CacheStatus {
    fn from((): ()) -> Self {
        CacheStatus::Ok
    }
}

impl From<UpdateOutcome> for CacheStatus {
    fn from(outcome: UpdateOutcome) -> Self {
        match outcome {
            UpdateOutcome::Updated => CacheStatus::Updated,
            UpdateOutcome::Unchanged => CacheStatus::Ok,
        }
    }
}

impl<T: Into<CacheStatus>> From<Result<T>> for CacheStatus {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(_) => CacheStatus::Fail,
        }
    }
}

impl CacheError {
    /// Returns true if the error is a group-guard violation.
    pub fn is_guarded(&self) -> bool {
        matches!(self, CacheError::Guarded { .. })
    }

    /// Returns true if the error reports a missing entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }
}
