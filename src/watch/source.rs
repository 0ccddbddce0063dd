//! watch::source
//!
//! Watches a directory for source files and queues their full content.
//!
//! A file is re-read on every create or modify notification. Content equal to
//! what was last queued for the same path is dropped, since editors often
//! write the same bytes more than once per save.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::RecursiveMode;
use tracing::{debug, info, warn};

use super::{is_content_change, start, WatchError, WatchHandle};
use crate::engine::Event;
use crate::queue::TQueue;

/// Start watching `dir` for files whose name ends with `suffix`.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns [`WatchError`] if the directory cannot be watched.
pub fn watch_sources(
    dir: &Path,
    suffix: &str,
    events: Arc<TQueue<Event>>,
) -> Result<WatchHandle, WatchError> {
    let (watcher, mut raw) = start(dir, RecursiveMode::NonRecursive)?;
    info!(dir = %dir.display(), suffix, "watching source files");

    let suffix = suffix.to_string();
    let task = tokio::spawn(async move {
        let mut last_seen: HashMap<PathBuf, String> = HashMap::new();
        while let Some(result) = raw.recv().await {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "source watcher error");
                    continue;
                }
            };
            if !is_content_change(&event.kind) {
                continue;
            }
            for path in event.paths {
                if !has_suffix(&path, &suffix) {
                    continue;
                }
                let content = match tokio::fs::read_to_string(&path).await {
                    Ok(content) => content,
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "source file unreadable");
                        continue;
                    }
                };
                if last_seen.get(&path) == Some(&content) {
                    continue;
                }
                last_seen.insert(path.clone(), content.clone());
                debug!(path = %path.display(), "source changed");
                events.enqueue(Event::SourceChanged { path, content });
            }
        }
    });

    Ok(WatchHandle::new(watcher, task))
}

/// Whether the file name of `path` ends with `suffix`.
pub fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(suffix) && name.len() > suffix.len())
}
