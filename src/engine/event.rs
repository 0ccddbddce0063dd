//! engine::event
//!
//! Events produced by the watchers and consumed by the dispatcher.

use std::collections::BTreeSet;
use std::path::PathBuf;

/// Something that happened outside the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A source file was created or modified.
    SourceChanged { path: PathBuf, content: String },
    /// One or more branch files changed; already debounced into one set.
    BranchPathsChanged { paths: BTreeSet<PathBuf> },
}

impl Event {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::SourceChanged { .. } => "source-changed",
            Event::BranchPathsChanged { .. } => "branch-paths-changed",
        }
    }
}
