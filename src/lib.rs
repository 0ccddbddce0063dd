//! Trellis - an interactive command loop over a mergeable codebase
//!
//! Trellis watches source files and branch files while reading commands from
//! a prompt, and keeps one current branch: a content-addressed snapshot of
//! named term and type definitions. Branches merge as a join semilattice, so
//! edits from the prompt and from other processes writing the same branch
//! are reconciled instead of overwritten.
//!
//! # Architecture
//!
//! - [`cli`] - Process arguments, logging, stdin reader, session startup
//! - [`engine`] - Dispatcher, commands, and reconciliation
//! - [`core`] - Domain types, branches, configuration, and paths
//! - [`queue`] - Blocking queues and line assembly
//! - [`store`] - Durable branch storage
//! - [`watch`] - Filesystem watchers and the debouncer
//! - [`frontend`] - Source checking and runtime collaborators
//! - [`ui`] - User interaction utilities
//!
//! # Correctness Invariants
//!
//! 1. Only the dispatcher reads the event queue and the line buffer
//! 2. Every branch change is merged with the durable branch before it is written
//! 3. The session's own writes never trigger a reload
//! 4. The runtime is released on every exit path

pub mod cli;
pub mod core;
pub mod engine;
pub mod frontend;
pub mod queue;
pub mod store;
pub mod ui;
pub mod watch;
