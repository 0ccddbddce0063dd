//! store::lock
//!
//! Exclusive codebase lock for branch-head writes.
//!
//! # Architecture
//!
//! Writing a branch head and pruning the heads it supersedes must not
//! interleave with another writer doing the same, or a pruning pass could
//! delete a head it never merged. Every [`super::FileBranchStore::put`]
//! therefore runs under this lock. Readers never take it: heads are written
//! by atomic rename, so a reader sees either the whole file or nothing.
//!
//! # Storage
//!
//! - `<codebase>/.lock` - Lock file with OS-level exclusive lock
//!
//! # Invariants
//!
//! - Lock is automatically released on drop (RAII pattern)
//! - [`StoreLock::acquire`] waits for any other holder
//! - The lock is process-wide and cross-process (`fs2` advisory lock)

use std::fs::{self, File, OpenOptions};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::CodebasePaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),
}

/// An exclusive lock on the codebase.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Acquire the codebase lock, waiting for any other holder.
    ///
    /// # Errors
    ///
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &CodebasePaths) -> Result<Self, LockError> {
        fs::create_dir_all(paths.root()).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", paths.root().display(), e))
        })?;

        let path = paths.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;
        file.lock_exclusive()
            .map_err(|e| LockError::AcquireFailed(e.to_string()))?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
