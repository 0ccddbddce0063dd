//! queue
//!
//! Multi-producer, single-consumer FIFO queues with async blocking reads.
//!
//! # Modules
//!
//! - [`line_buffer`] - Line assembly on top of a character queue
//!
//! # Design
//!
//! [`TQueue`] is the only synchronization primitive the command loop needs.
//! Producers call [`TQueue::enqueue`] from any thread; it never blocks.
//! The consumer awaits a condition over the queue contents (non-empty, or a
//! prefix ended by an element failing a predicate) and either inspects or
//! removes items in the same critical section that observed the condition.
//!
//! # Invariants
//!
//! - FIFO order is preserved across all producers
//! - Every waiting operation is cancel-safe: dropping its future never loses
//!   or duplicates an item, so waits can be raced in `tokio::select!`
//! - After [`TQueue::close`], a wait whose condition can no longer be met
//!   returns [`QueueClosed`] instead of blocking forever

pub mod line_buffer;

pub use line_buffer::LineBuffer;

use std::collections::VecDeque;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

/// The queue was closed and the awaited condition can no longer be met.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("queue closed")]
pub struct QueueClosed;

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// A FIFO queue with async blocking reads.
///
/// # Example
///
/// ```
/// use trellis::queue::TQueue;
///
/// # tokio_test_block_on(async {
/// let queue = TQueue::new();
/// queue.enqueue(1);
/// queue.enqueue(2);
/// queue.enqueue(10);
///
/// assert_eq!(queue.peek().await.unwrap(), 1);
/// assert_eq!(queue.take_while(|n| *n < 5).await.unwrap(), vec![1, 2]);
/// assert_eq!(queue.dequeue().await.unwrap(), 10);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug)]
pub struct TQueue<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
}

impl<T> Default for TQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Append an item. Never blocks.
    pub fn enqueue(&self, item: T) {
        self.inner.lock().items.push_back(item);
        self.notify.notify_waiters();
    }

    /// Append several items as one contiguous run.
    pub fn enqueue_all(&self, items: impl IntoIterator<Item = T>) {
        self.inner.lock().items.extend(items);
        self.notify.notify_waiters();
    }

    /// Mark that no producer will enqueue again.
    ///
    /// Items already queued stay readable.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Remove and return the oldest item, waiting until one exists.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the queue is closed and empty.
    pub async fn dequeue(&self) -> Result<T, QueueClosed> {
        self.wait_for(|items| items.pop_front()).await
    }

    /// Remove the oldest item if one is queued right now.
    pub fn try_dequeue(&self) -> Option<T> {
        self.inner.lock().items.pop_front()
    }

    /// Remove and return the longest prefix satisfying `pred`.
    ///
    /// Waits until an item failing `pred` is queued; that item stays at the
    /// head of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the queue is closed before such an item arrives.
    pub async fn take_while<P>(&self, pred: P) -> Result<Vec<T>, QueueClosed>
    where
        P: Fn(&T) -> bool,
    {
        self.wait_for(|items| {
            let end = items.iter().position(|item| !pred(item))?;
            Some(items.drain(..end).collect())
        })
        .await
    }

    async fn wait_for<R, F>(&self, mut attempt: F) -> Result<R, QueueClosed>
    where
        F: FnMut(&mut VecDeque<T>) -> Option<R>,
    {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so an enqueue between the check and
            // the await still wakes us.
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock();
                if let Some(result) = attempt(&mut inner.items) {
                    return Ok(result);
                }
                if inner.closed {
                    return Err(QueueClosed);
                }
            }

            notified.await;
        }
    }
}

impl<T: Clone> TQueue<T> {
    /// Return a copy of the oldest item without removing it, waiting until one exists.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the queue is closed and empty.
    pub async fn peek(&self) -> Result<T, QueueClosed> {
        self.wait_for(|items| items.front().cloned()).await
    }

    /// Copy the longest prefix satisfying `pred` without removing it.
    ///
    /// Waits until an item failing `pred` is queued.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the queue is closed before such an item arrives.
    pub async fn peek_while<P>(&self, pred: P) -> Result<Vec<T>, QueueClosed>
    where
        P: Fn(&T) -> bool,
    {
        self.wait_for(|items| {
            let end = items.iter().position(|item| !pred(item))?;
            Some(items.iter().take(end).cloned().collect())
        })
        .await
    }

    /// Copy the prefix satisfying `pred` that is queued right now, possibly empty.
    pub fn try_peek_while<P>(&self, pred: P) -> Vec<T>
    where
        P: Fn(&T) -> bool,
    {
        self.inner
            .lock()
            .items
            .iter()
            .take_while(|item| pred(*item))
            .cloned()
            .collect()
    }
}
