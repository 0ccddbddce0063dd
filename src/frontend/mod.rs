//! frontend
//!
//! Collaborators the command loop hands source text and checked programs to.
//!
//! # Modules
//!
//! - [`decl`] - Built-in declaration frontend
//! - [`runtime`] - Built-in runtime that reports checked programs
//!
//! # Architecture
//!
//! The loop never looks inside source text. It asks a [`Frontend`] to check
//! a file and gets back either [`Diagnostic`]s, which are shown verbatim, or
//! a [`CheckedProgram`], which is passed to the [`Runtime`]. The runtime is
//! acquired once per session through a [`RuntimeHandle`], which guarantees
//! [`Runtime::terminate`] runs exactly once however the session ends.

pub mod decl;
pub mod runtime;

pub use decl::DeclarationFrontend;
pub use runtime::SummaryRuntime;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::core::branch::{Branch, Definition};
use crate::core::types::Name;

/// A problem found while checking source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based source line.
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// A source file that checked cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedProgram {
    pub path: PathBuf,
    /// Definitions in source order.
    pub definitions: Vec<(Name, Definition)>,
    /// Watch expressions in source order.
    pub watches: Vec<String>,
}

/// Result of checking source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Diagnostics(Vec<Diagnostic>),
    Checked(CheckedProgram),
}

/// Parses and checks source text.
pub trait Frontend: Send + Sync {
    fn check(&self, path: &Path, source: &str) -> CheckOutcome;
}

/// Errors from the runtime.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("runtime has been terminated")]
    Terminated,

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// Runs checked programs in the context of a branch.
#[async_trait]
pub trait Runtime: Send + Sync {
    async fn evaluate(&self, program: &CheckedProgram, branch: &Branch) -> Result<(), RuntimeError>;

    /// Release every resource held by the runtime.
    fn terminate(&self);
}

/// Scoped ownership of a [`Runtime`].
///
/// Dropping the handle terminates the runtime if [`RuntimeHandle::release`]
/// has not already done so.
pub struct RuntimeHandle {
    runtime: Arc<dyn Runtime>,
    released: AtomicBool,
}

impl RuntimeHandle {
    pub fn acquire(runtime: Arc<dyn Runtime>) -> Self {
        debug!("runtime acquired");
        Self {
            runtime,
            released: AtomicBool::new(false),
        }
    }

    /// Evaluate `program` against `branch`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Terminated`] after the handle was released.
    pub async fn evaluate(&self, program: &CheckedProgram, branch: &Branch) -> Result<(), RuntimeError> {
        if self.is_released() {
            return Err(RuntimeError::Terminated);
        }
        self.runtime.evaluate(program, branch).await
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Terminate the runtime. Later calls do nothing.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.runtime.terminate();
            debug!("runtime released");
        }
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for RuntimeHandle {
    fn drop(&mut self) {
        self.release();
    }
}
