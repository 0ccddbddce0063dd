//! watch::debounce
//!
//! Coalesces bursts of branch-file notifications into single events.
//!
//! # Algorithm
//!
//! 1. Wait for a first raw path
//! 2. Keep collecting distinct paths; every arrival restarts the quiet timer
//! 3. When the quiet interval passes with no arrival, drop paths that name
//!    the current branch's own file, then emit one
//!    [`Event::BranchPathsChanged`] if anything is left
//!
//! The current branch's file name is read from a `watch` channel the
//! dispatcher publishes to after every transition.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::engine::Event;
use crate::queue::TQueue;

/// Paths in `paths` whose file name is not `own_file_name`.
pub fn without_own_writes(paths: &BTreeSet<PathBuf>, own_file_name: &str) -> BTreeSet<PathBuf> {
    paths
        .iter()
        .filter(|path| path.file_name().and_then(|n| n.to_str()) != Some(own_file_name))
        .cloned()
        .collect()
}

/// Run the debouncer until `raw` is closed and drained.
pub async fn run_debouncer(
    raw: Arc<TQueue<PathBuf>>,
    events: Arc<TQueue<Event>>,
    quiet: Duration,
    current_file: watch::Receiver<String>,
) {
    loop {
        let Ok(first) = raw.dequeue().await else {
            break;
        };
        let mut batch = BTreeSet::from([first]);
        let mut closed = false;

        loop {
            match tokio::time::timeout(quiet, raw.dequeue()).await {
                Ok(Ok(path)) => {
                    batch.insert(path);
                }
                Ok(Err(_)) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }

        let own = current_file.borrow().clone();
        let paths = without_own_writes(&batch, &own);
        if paths.is_empty() {
            debug!(count = batch.len(), "dropped batch of own writes");
        } else {
            debug!(count = paths.len(), "branch files changed");
            events.enqueue(Event::BranchPathsChanged { paths });
        }

        if closed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_own_file_name_anywhere() {
        let own = format!("{}.ubf", "a".repeat(64));
        let other = format!("{}.ubf", "b".repeat(64));
        let paths = BTreeSet::from([
            PathBuf::from("branches/master").join(&own),
            PathBuf::from("branches/topic").join(&own),
            PathBuf::from("branches/master").join(&other),
        ]);

        let kept = without_own_writes(&paths, &own);
        assert_eq!(
            kept,
            BTreeSet::from([PathBuf::from("branches/master").join(&other)])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_on_close() {
        let raw = Arc::new(TQueue::new());
        let events = Arc::new(TQueue::new());
        let (_tx, rx) = watch::channel(String::new());

        raw.enqueue(PathBuf::from("x.ubf"));
        raw.close();
        run_debouncer(raw, events.clone(), Duration::from_millis(400), rx).await;

        assert_eq!(
            events.try_dequeue(),
            Some(Event::BranchPathsChanged {
                paths: BTreeSet::from([PathBuf::from("x.ubf")])
            })
        );
    }
}
