//! engine::session
//!
//! The state owned by the dispatcher.
//!
//! A [`Session`] is replaced wholesale on every transition; the builder
//! methods consume the old value and return the new one.

use std::sync::Arc;

use crate::core::branch::Branch;
use crate::core::types::BranchName;
use crate::frontend::CheckedProgram;

/// Current branch, its name, and the last program that checked cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub name: BranchName,
    pub branch: Branch,
    pub latest: Option<Arc<CheckedProgram>>,
}

impl Session {
    pub fn new(name: BranchName, branch: Branch) -> Self {
        Self {
            name,
            branch,
            latest: None,
        }
    }

    /// Same name, new branch value.
    pub fn with_branch(self, branch: Branch) -> Self {
        Self { branch, ..self }
    }

    /// Switch to another named branch.
    pub fn switch(self, name: BranchName, branch: Branch) -> Self {
        Self {
            name,
            branch,
            ..self
        }
    }

    pub fn with_latest(self, program: CheckedProgram) -> Self {
        Self {
            latest: Some(Arc::new(program)),
            ..self
        }
    }

    /// File name the current branch is stored under.
    pub fn file_name(&self) -> String {
        self.branch.file_name()
    }
}
