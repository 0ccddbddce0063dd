//! queue::line_buffer
//!
//! Assembles a raw character stream into command lines.
//!
//! The keystroke reader enqueues characters as they arrive. The dispatcher
//! waits for a complete line without consuming it, so that wait can be raced
//! against the event queue, and only takes the line once it has chosen to
//! handle input. The partially typed line stays visible through
//! [`LineBuffer::incomplete_line`] for prompt redraws.

use std::sync::Arc;

use super::{QueueClosed, TQueue};

/// Line terminator.
pub const NEWLINE: char = '\n';

fn not_newline(c: &char) -> bool {
    *c != NEWLINE
}

/// Line-oriented view of a shared character queue.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    chars: Arc<TQueue<char>>,
}

impl LineBuffer {
    pub fn new(chars: Arc<TQueue<char>>) -> Self {
        Self { chars }
    }

    /// The character queue producers write into.
    pub fn chars(&self) -> &Arc<TQueue<char>> {
        &self.chars
    }

    /// Enqueue text as if it had been typed.
    pub fn feed(&self, text: &str) {
        self.chars.enqueue_all(text.chars());
    }

    /// Signal end of input.
    pub fn close(&self) {
        self.chars.close();
    }

    /// Characters typed so far on the current line. Never blocks.
    pub fn incomplete_line(&self) -> String {
        self.chars.try_peek_while(not_newline).into_iter().collect()
    }

    /// Wait until a full line is buffered, without consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] once input has ended and no full line remains.
    pub async fn await_complete_line(&self) -> Result<(), QueueClosed> {
        self.chars.peek_while(not_newline).await.map(|_| ())
    }

    /// Consume the next line and its terminator, returning the line.
    ///
    /// A trailing carriage return is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] once input has ended and no full line remains.
    ///
    /// # Panics
    ///
    /// Panics if the character following the line is not the terminator,
    /// which means a second consumer is reading the same queue.
    pub async fn take_line(&self) -> Result<String, QueueClosed> {
        let line: String = self.chars.take_while(not_newline).await?.into_iter().collect();
        let terminator = self.chars.try_dequeue();
        if terminator != Some(NEWLINE) {
            panic!("line buffer expected a newline after {line:?}, found {terminator:?}");
        }
        Ok(line.strip_suffix('\r').map(str::to_string).unwrap_or(line))
    }
}
