//! Advisory per-workshop lock held for the duration of an apply.

use crate::core::error::OrcError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Exclusive lock on `<state_dir>/locks/<workshop_id>.lock`, released on drop.
///
/// The file itself stays behind: unlinking it would let a waiter holding the old
/// inode and a newcomer creating a fresh one both believe they own the lock.
#[derive(Debug)]
pub struct WorkshopLock {
    file: File,
    path: PathBuf,
}

impl WorkshopLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkshopLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub fn lock_path(state_dir: &Path, workshop_id: &str) -> PathBuf {
    state_dir.join("locks").join(format!("{}.lock", workshop_id))
}

/// Acquire the workshop lock without blocking.
pub fn acquire(state_dir: &Path, workshop_id: &str) -> Result<WorkshopLock, OrcError> {
    let path = lock_path(state_dir, workshop_id);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)?;
    match file.try_lock_exclusive() {
        Ok(()) => {
            tracing::debug!(lock = %path.display(), "acquired workshop lock");
            Ok(WorkshopLock { file, path })
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            Err(OrcError::Locked(workshop_id.to_string()))
        }
        Err(e) => {
            // fs2 reports contention as a raw OS error on some platforms
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(OrcError::Locked(workshop_id.to_string()));
            }
            Err(OrcError::IoError(e))
        }
    }
}
