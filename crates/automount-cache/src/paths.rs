//! Filesystem helpers for the directories backing map entries.
//!
//! None of these run while the structural lock is held: callers gather the
//! paths under the lock and do the filesystem work afterwards.

use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt};
use std::path::{Path, PathBuf};

use crate::entry::DevIno;
use crate::error::{CacheError, Result};

/// Full filesystem path of a key below an automount root.
///
/// Absolute keys (direct maps) are used as they are; relative keys are
/// joined as `root/key`. The length, counting a terminator byte, must not
/// exceed `max_len`; it is checked before the path is built.
pub fn full_path(root: &Path, key: &str, max_len: usize) -> Result<PathBuf> {
    let len = if key.starts_with('/') {
        key.len() + 1
    } else {
        key.len() + 1 + root.as_os_str().len() + 1
    };
    if len > max_len {
        return Err(CacheError::PathTooLong { len, max: max_len });
    }

    if key.starts_with('/') {
        Ok(PathBuf::from(key))
    } else {
        Ok(root.join(key))
    }
}

/// Best-effort removal of a backing directory and its emptied parents.
///
/// Removes `path`, then each parent that became empty, stopping at `root`
/// (never removed) or at the first directory that cannot be removed.
/// Returns the number of directories removed.
pub fn remove_empty_dirs(path: &Path, root: &Path) -> usize {
    let mut removed = 0;
    let mut current = Some(path);

    while let Some(dir) = current {
        if dir == root || dir.as_os_str().is_empty() || dir == Path::new("/") {
            break;
        }
        if dir != path && !dir.starts_with(root) {
            break;
        }
        match fs::remove_dir(dir) {
            Ok(()) => {
                tracing::debug!("removed backing directory {}", dir.display());
                removed += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && removed == 0 => {}
            Err(e) => {
                tracing::debug!("stopped removing at {}: {}", dir.display(), e);
                break;
            }
        }
        current = dir.parent();
    }

    removed
}

/// Create a ghost directory (and any missing parents) with `mode`.
///
/// An already existing directory is not an error.
pub fn create_ghost_dir(path: &Path, mode: u32) -> io::Result<()> {
    match DirBuilder::new().recursive(true).mode(mode).create(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

/// (device, inode) of an existing path.
pub fn stat_dev_ino(path: &Path) -> io::Result<DevIno> {
    let meta = fs::metadata(path)?;
    Ok(DevIno {
        dev: meta.dev(),
        ino: meta.ino(),
    })
}
