//! engine
//!
//! The command loop: events, commands, and branch reconciliation.
//!
//! # Architecture
//!
//! ```text
//! keystrokes ──> LineBuffer ──┐
//!                             ├──> Dispatcher ──> handlers ──> reconcile_and_write ──> store
//! watchers ──> TQueue<Event> ─┘
//! ```
//!
//! The [`Dispatcher`] owns the [`Session`] and is the only code that replaces
//! it. Producers only enqueue. Every branch change a command makes passes
//! through [`reconcile_and_write`], which merges with the durable branch
//! before writing.
//!
//! # Invariants
//!
//! - Session state is never shared; each transition returns a new value
//! - User errors are printed and leave the session unchanged
//! - Store failures end the loop with an error

pub mod command;
pub mod dispatcher;
pub mod event;
pub mod handlers;
pub mod reconcile;
pub mod session;

pub use command::{parse_line, Parsed, ReplCommand};
pub use dispatcher::Dispatcher;
pub use event::Event;
pub use handlers::Transition;
pub use reconcile::reconcile_and_write;
pub use session::Session;

use std::sync::Arc;

use anyhow::Context as _;

use crate::core::branch::Branch;
use crate::core::types::BranchName;
use crate::queue::LineBuffer;
use crate::store::{BranchStore, StoreError};
use crate::ui::output::Console;

/// What command handlers need besides the session.
#[derive(Clone)]
pub struct Context {
    /// Durable branch store.
    pub store: Arc<dyn BranchStore>,
    /// User-facing output.
    pub console: Console,
    /// Line input; prompts read their answers from it.
    pub input: LineBuffer,
    /// Interactive mode enabled.
    pub interactive: bool,
}

impl Context {
    /// Run one store operation on the blocking thread pool.
    ///
    /// Store calls do file I/O and may wait on the codebase lock, so they
    /// never run on the dispatcher's own task.
    ///
    /// # Errors
    ///
    /// Returns the store's error, or an error if the operation panicked.
    pub async fn with_store<T, F>(&self, op: F) -> anyhow::Result<T>
    where
        F: FnOnce(&dyn BranchStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .context("Branch store task failed")?;
        Ok(result?)
    }

    /// [`reconcile_and_write`] on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub async fn reconcile(&self, name: &BranchName, candidate: &Branch) -> anyhow::Result<Branch> {
        let name = name.clone();
        let candidate = candidate.clone();
        self.with_store(move |store| reconcile_and_write(store, &name, &candidate))
            .await
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("console", &self.console)
            .field("interactive", &self.interactive)
            .finish_non_exhaustive()
    }
}
