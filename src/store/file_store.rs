//! store::file_store
//!
//! Branch heads stored as files.
//!
//! # Layout
//!
//! `<codebase>/branches/<name>/<hash>.ubf`, each file one JSON-encoded
//! [`Branch`]. A name may have several heads at once when independent
//! processes wrote it; reading a name merges all of them.
//!
//! # Writes
//!
//! - Heads are written to a temp file, synced, then renamed into place
//! - After a write, heads whose edits are included in the new head are
//!   deleted; heads that are not (written concurrently by someone else) stay
//! - Writes run under [`StoreLock`]
//!
//! # Example
//!
//! ```no_run
//! use trellis::core::branch::Branch;
//! use trellis::core::types::BranchName;
//! use trellis::store::{BranchStore, FileBranchStore};
//!
//! let store = FileBranchStore::open(".trellis")?;
//! let master = BranchName::new("master").unwrap();
//! store.put(&master, &Branch::empty())?;
//! assert!(store.exists(&master)?);
//! # Ok::<(), trellis::store::StoreError>(())
//! ```

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::lock::StoreLock;
use super::{BranchStore, StoreError};
use crate::core::branch::Branch;
use crate::core::paths::CodebasePaths;
use crate::core::types::BranchName;

/// File-backed branch store rooted at a codebase directory.
#[derive(Debug, Clone)]
pub struct FileBranchStore {
    paths: CodebasePaths,
}

impl FileBranchStore {
    /// Open (creating if needed) the store at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory layout cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let paths = CodebasePaths::new(root);
        paths
            .ensure_dirs()
            .map_err(|e| StoreError::io(paths.branches_dir(), e))?;
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &CodebasePaths {
        &self.paths
    }

    /// Every readable head stored under `name`, with its path.
    ///
    /// Unreadable or malformed heads are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the branch directory exists but cannot be listed.
    pub fn heads(&self, name: &BranchName) -> Result<Vec<(PathBuf, Branch)>, StoreError> {
        let dir = self.paths.branch_dir(name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(dir, e)),
        };

        let mut heads = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
            if !CodebasePaths::is_branch_file(&path) {
                continue;
            }
            match read_head(&path) {
                Ok(branch) => heads.push((path, branch)),
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "skipping unreadable branch head")
                }
            }
        }
        heads.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(heads)
    }

    fn write_head(&self, name: &BranchName, branch: &Branch) -> Result<PathBuf, StoreError> {
        let dir = self.paths.branch_dir(name);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let file_name = branch.file_name();
        let path = self.paths.branch_file(name, &file_name);
        let temp_path = dir.join(format!("{file_name}.tmp"));

        let bytes =
            serde_json::to_vec(branch).map_err(|e| StoreError::Serialize(e.to_string()))?;

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| StoreError::io(&temp_path, e))?;
            file.write_all(&bytes)
                .map_err(|e| StoreError::io(&temp_path, e))?;
            file.sync_all().map_err(|e| StoreError::io(&temp_path, e))?;
        }

        fs::rename(&temp_path, &path).map_err(|e| StoreError::io(&path, e))?;
        Ok(path)
    }
}

fn read_head(path: &Path) -> Result<Branch, String> {
    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

impl BranchStore for FileBranchStore {
    fn get(&self, name: &BranchName) -> Result<Option<Branch>, StoreError> {
        let heads = self.heads(name)?;
        Ok(heads
            .into_iter()
            .map(|(_, branch)| branch)
            .reduce(|acc, branch| acc.merge(&branch)))
    }

    fn put(&self, name: &BranchName, branch: &Branch) -> Result<(), StoreError> {
        let _lock = StoreLock::acquire(&self.paths)?;

        let written = self.write_head(name, branch)?;
        debug!(branch = %name, head = %written.display(), "wrote branch head");

        for (path, head) in self.heads(name)? {
            if path == written || !branch.includes(&head) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => debug!(branch = %name, head = %path.display(), "pruned superseded head"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }
        Ok(())
    }

    fn list(&self) -> Result<BTreeSet<BranchName>, StoreError> {
        let dir = self.paths.branches_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(StoreError::io(dir, e)),
        };

        let mut names = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry
                .file_name()
                .to_str()
                .and_then(|s| BranchName::new(s).ok())
            {
                names.insert(name);
            }
        }
        Ok(names)
    }
}
