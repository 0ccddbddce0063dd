//! engine::reconcile
//!
//! The single write path for branch changes.
//!
//! # Invariants
//!
//! - A candidate is always merged with what is durable under the name before
//!   it is written, so a concurrent external write is never overwritten
//! - The returned branch is exactly what was written

use tracing::debug;

use crate::core::branch::Branch;
use crate::core::types::BranchName;
use crate::store::{BranchStore, StoreError};

/// Merge `candidate` with the durable branch under `name`, write, and return the result.
///
/// An absent durable branch is treated as empty.
///
/// # Errors
///
/// Returns [`StoreError`] if the store cannot be read or written.
pub fn reconcile_and_write(
    store: &dyn BranchStore,
    name: &BranchName,
    candidate: &Branch,
) -> Result<Branch, StoreError> {
    let reconciled = match store.get(name)? {
        Some(durable) => candidate.merge(&durable),
        None => candidate.clone(),
    };
    store.put(name, &reconciled)?;
    debug!(branch = %name, hash = %reconciled.hash().short(12), "reconciled branch");
    Ok(reconciled)
}
