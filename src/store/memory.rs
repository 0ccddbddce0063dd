//! store::memory
//!
//! In-memory branch store for deterministic testing.
//!
//! # Example
//!
//! ```
//! use trellis::core::branch::Branch;
//! use trellis::core::types::BranchName;
//! use trellis::store::{BranchStore, MemoryBranchStore};
//!
//! let store = MemoryBranchStore::new();
//! let master = BranchName::new("master").unwrap();
//!
//! store.put(&master, &Branch::empty()).unwrap();
//! assert!(store.exists(&master).unwrap());
//!
//! // Simulate a snapshot that can no longer be read.
//! store.hide(&master);
//! assert!(store.get(&master).unwrap().is_none());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{BranchStore, StoreError};
use crate::core::branch::Branch;
use crate::core::types::{BranchName, Hash};

/// In-memory branch store.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBranchStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    branches: BTreeMap<BranchName, Branch>,
    hidden: BTreeSet<BranchName>,
    writes: Vec<(BranchName, Hash)>,
}

impl MemoryBranchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a branch without recording a write.
    pub fn with_branch(self, name: &BranchName, branch: Branch) -> Self {
        self.inner.lock().branches.insert(name.clone(), branch);
        self
    }

    /// Make `get` report no snapshot for `name` until the next `put`.
    pub fn hide(&self, name: &BranchName) {
        self.inner.lock().hidden.insert(name.clone());
    }

    /// Every `put` so far, in order.
    pub fn writes(&self) -> Vec<(BranchName, Hash)> {
        self.inner.lock().writes.clone()
    }
}

impl BranchStore for MemoryBranchStore {
    fn get(&self, name: &BranchName) -> Result<Option<Branch>, StoreError> {
        let inner = self.inner.lock();
        if inner.hidden.contains(name) {
            return Ok(None);
        }
        Ok(inner.branches.get(name).cloned())
    }

    fn put(&self, name: &BranchName, branch: &Branch) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.hidden.remove(name);
        inner.branches.insert(name.clone(), branch.clone());
        inner.writes.push((name.clone(), branch.hash()));
        Ok(())
    }

    fn list(&self) -> Result<BTreeSet<BranchName>, StoreError> {
        Ok(self.inner.lock().branches.keys().cloned().collect())
    }
}
