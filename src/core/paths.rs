//! core::paths
//!
//! Centralized path routing for codebase storage locations.
//!
//! **Hard rule:** No code outside this module joins path components onto the
//! codebase root. Everything goes through [`CodebasePaths`], so the store,
//! the watchers and the self-change filter agree on where branch files live.
//!
//! # Storage Layout
//!
//! - `config.toml` - Codebase configuration
//! - `.lock` - Exclusive lock held while writing branch heads
//! - `branches/<name>/<hash>.ubf` - Branch heads, one directory per name
//!
//! # Example
//!
//! ```
//! use trellis::core::paths::CodebasePaths;
//! use trellis::core::types::BranchName;
//! use std::path::PathBuf;
//!
//! let paths = CodebasePaths::new("/work/.trellis");
//! let master = BranchName::new("master").unwrap();
//!
//! assert_eq!(
//!     paths.branch_dir(&master),
//!     PathBuf::from("/work/.trellis/branches/master")
//! );
//! ```

use std::path::{Path, PathBuf};

use crate::core::branch::BRANCH_FILE_EXTENSION;
use crate::core::types::BranchName;

/// Path routing for one codebase directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodebasePaths {
    root: PathBuf,
}

impl CodebasePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The codebase root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/config.toml`
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// `<root>/.lock`
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".lock")
    }

    /// `<root>/branches`, the directory the branch-file watcher observes.
    pub fn branches_dir(&self) -> PathBuf {
        self.root.join("branches")
    }

    /// `<root>/branches/<name>`
    pub fn branch_dir(&self, name: &BranchName) -> PathBuf {
        self.branches_dir().join(name.as_str())
    }

    /// `<root>/branches/<name>/<file_name>`
    pub fn branch_file(&self, name: &BranchName, file_name: &str) -> PathBuf {
        self.branch_dir(name).join(file_name)
    }

    /// Whether `path` has the branch-file extension.
    pub fn is_branch_file(path: &Path) -> bool {
        path.extension().and_then(|ext| ext.to_str()) == Some(BRANCH_FILE_EXTENSION)
    }

    /// Create the root and branches directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an IO error if directory creation fails.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.branches_dir())
    }
}
