//! watch::branch_files
//!
//! Watches the branch store for changed branch files.
//!
//! Paths go to an intermediate queue, not the event queue; the
//! [`super::debounce`] task batches them first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::RecursiveMode;
use tracing::{info, trace, warn};

use super::{is_content_change, start, WatchError, WatchHandle};
use crate::core::paths::CodebasePaths;
use crate::queue::TQueue;

/// Start watching `branches_dir` (recursively) for branch files.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns [`WatchError`] if the directory cannot be watched.
pub fn watch_branch_files(
    branches_dir: &Path,
    raw_paths: Arc<TQueue<PathBuf>>,
) -> Result<WatchHandle, WatchError> {
    let (watcher, mut raw) = start(branches_dir, RecursiveMode::Recursive)?;
    info!(dir = %branches_dir.display(), "watching branch files");

    let task = tokio::spawn(async move {
        while let Some(result) = raw.recv().await {
            match result {
                Ok(event) if is_content_change(&event.kind) => {
                    for path in event.paths {
                        if CodebasePaths::is_branch_file(&path) {
                            trace!(path = %path.display(), "branch file changed");
                            raw_paths.enqueue(path);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "branch file watcher error"),
            }
        }
    });

    Ok(WatchHandle::new(watcher, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test(flavor = "multi_thread")]
    async fn queues_branch_file_paths_only() {
        let temp = TempDir::new().unwrap();
        let master = temp.path().join("master");
        std::fs::create_dir_all(&master).unwrap();
        let raw = Arc::new(TQueue::new());
        let _handle = watch_branch_files(temp.path(), raw.clone()).unwrap();

        std::fs::write(master.join("scratch.tmp"), "{}").unwrap();
        let head = master.join(format!("{}.ubf", "a".repeat(64)));
        std::fs::write(&head, "{}").unwrap();

        let path = tokio::time::timeout(Duration::from_secs(10), raw.dequeue())
            .await
            .expect("no branch file notification")
            .unwrap();
        assert_eq!(path.file_name(), head.file_name());
    }
}
