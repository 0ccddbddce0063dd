//! store
//!
//! Durable branch storage.
//!
//! # Modules
//!
//! - [`file_store`] - Branch heads as files under the codebase directory
//! - [`memory`] - In-memory store for tests
//! - [`lock`] - Exclusive lock serializing head writes
//!
//! # Contract
//!
//! The [`BranchStore`] trait is everything the command loop needs from
//! persistence: named lookup, named write, and listing. `put` is the only
//! mutation and is atomic per call: a concurrent `get` sees the state before
//! or after it, never a partial write. Stores never decide merges; callers
//! reconcile through [`crate::engine::reconcile::reconcile_and_write`].

pub mod file_store;
pub mod lock;
pub mod memory;

pub use file_store::FileBranchStore;
pub use lock::{LockError, StoreLock};
pub use memory::MemoryBranchStore;

use std::collections::BTreeSet;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::branch::Branch;
use crate::core::types::BranchName;

/// Errors from branch storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("i/o error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to encode a branch.
    #[error("failed to serialize branch: {0}")]
    Serialize(String),

    /// Could not take the write lock.
    #[error("lock error: {0}")]
    Lock(#[from] LockError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Persists and retrieves branches by name.
///
/// Implementations must be thread-safe (Send + Sync).
pub trait BranchStore: Send + Sync {
    /// Load the branch stored under `name`.
    ///
    /// Returns `Ok(None)` when no valid snapshot exists under that name.
    fn get(&self, name: &BranchName) -> Result<Option<Branch>, StoreError>;

    /// Store `branch` under `name`.
    fn put(&self, name: &BranchName, branch: &Branch) -> Result<(), StoreError>;

    /// All known branch names.
    fn list(&self) -> Result<BTreeSet<BranchName>, StoreError>;

    /// Whether a valid snapshot exists under `name`.
    fn exists(&self, name: &BranchName) -> Result<bool, StoreError> {
        Ok(self.get(name)?.is_some())
    }
}
