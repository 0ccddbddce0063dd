//! watch
//!
//! Producers that turn filesystem changes into queued items.
//!
//! # Modules
//!
//! - [`source`] - Source files, read whole and queued as events
//! - [`branch_files`] - Branch files, queued as raw paths
//! - [`debounce`] - Coalesces raw paths into one event per burst
//!
//! # Architecture
//!
//! Each watcher owns a `notify` watcher whose callback forwards raw results
//! into an unbounded channel. A tokio task drains the channel, filters by
//! file suffix, and enqueues into a [`crate::queue::TQueue`]. Watchers never
//! touch session state.

pub mod branch_files;
pub mod debounce;
pub mod source;

pub use branch_files::watch_branch_files;
pub use debounce::{run_debouncer, without_own_writes};
pub use source::watch_sources;

use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;

/// Errors that can occur while setting up a watcher.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to create watcher: {0}")]
    WatcherCreation(#[from] notify::Error),

    #[error("failed to watch path {path}: {source}")]
    WatchPath {
        path: PathBuf,
        source: notify::Error,
    },
}

/// A running watcher. Dropping it stops both the watch and its task.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl WatchHandle {
    fn new(watcher: RecommendedWatcher, task: JoinHandle<()>) -> Self {
        Self {
            _watcher: watcher,
            task,
        }
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

type RawEvents = UnboundedReceiver<notify::Result<Event>>;

/// Watch `dir` and forward every notification into a channel.
fn start(dir: &Path, mode: RecursiveMode) -> Result<(RecommendedWatcher, RawEvents), WatchError> {
    let (tx, rx) = unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.send(res);
    })?;
    watcher
        .watch(dir, mode)
        .map_err(|source| WatchError::WatchPath {
            path: dir.to_path_buf(),
            source,
        })?;
    Ok((watcher, rx))
}

/// Whether an event means file content may have changed.
fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}
