//! Single-writer lock for sync runs
//!
//! An exclusive `flock` on `<state file>.lock`. The OS releases it when the
//! holder exits, so a crashed run never leaves a stale lock.

use crate::error::StateError;
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Held for the duration of a run; released on drop
pub struct SyncLock {
    _file: File,
    path: PathBuf,
}

impl SyncLock {
    pub fn lock_path_for(state_path: &Path) -> PathBuf {
        let mut name = state_path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Try to take the lock without blocking
    ///
    /// Returns `Ok(None)` when another run holds it.
    pub fn try_acquire(state_path: &Path) -> Result<Option<Self>, StateError> {
        let path = Self::lock_path_for(state_path);
        let lock_failed = |e: std::io::Error| {
            StateError::LockFailed(format!("{}: {}", path.display(), e))
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(lock_failed)?;
        }
        let file = File::create(&path).map_err(lock_failed)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!("Acquired sync lock {}", path.display());
                Ok(Some(Self { _file: file, path }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                tracing::debug!("Sync lock {} is held by another run", path.display());
                Ok(None)
            }
            Err(e) => Err(lock_failed(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        // The lock file is left in place and reused by the next run
        tracing::debug!("Releasing sync lock {}", self.path.display());
    }
}
