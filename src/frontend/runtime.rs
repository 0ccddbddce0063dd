//! frontend::runtime
//!
//! Built-in runtime that reports what a checked program would change.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use super::{CheckedProgram, Runtime, RuntimeError};
use crate::core::branch::{Branch, Definition};
use crate::core::types::Name;
use crate::ui::output::Console;

/// How a checked definition relates to the current branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionStatus {
    /// The name is free in the branch.
    New,
    /// The branch already binds the name to this definition.
    Unchanged,
    /// The branch binds the name to something else.
    Differs,
}

/// Classify one checked definition against `branch`.
pub fn status_of(branch: &Branch, name: &Name, definition: &Definition) -> DefinitionStatus {
    let references = branch.names(definition.kind).references(name);
    if references.contains(&definition.reference()) {
        DefinitionStatus::Unchanged
    } else if references.is_empty() {
        DefinitionStatus::New
    } else {
        DefinitionStatus::Differs
    }
}

/// Prints a summary of each checked program and echoes its watches.
#[derive(Debug)]
pub struct SummaryRuntime {
    console: Console,
    terminated: AtomicBool,
}

impl SummaryRuntime {
    pub fn new(console: Console) -> Self {
        Self {
            console,
            terminated: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Runtime for SummaryRuntime {
    async fn evaluate(&self, program: &CheckedProgram, branch: &Branch) -> Result<(), RuntimeError> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(RuntimeError::Terminated);
        }

        self.console.print(format!(
            "Checked {}: {} definition(s)",
            program.path.display(),
            program.definitions.len()
        ));

        let mut addable = 0;
        for (name, definition) in &program.definitions {
            let line = match status_of(branch, name, definition) {
                DefinitionStatus::New => {
                    addable += 1;
                    format!("  + {} {}", definition.kind, name)
                }
                DefinitionStatus::Unchanged => format!("    {} {} (unchanged)", definition.kind, name),
                DefinitionStatus::Differs => {
                    format!("  ! {} {} (differs from the branch)", definition.kind, name)
                }
            };
            self.console.print(line);
        }
        if addable > 0 {
            self.console
                .print(format!("Run `add` to add {addable} new definition(s)."));
        }

        for watch in &program.watches {
            self.console.print(format!("> {watch}"));
        }
        Ok(())
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
        debug!("summary runtime terminated");
    }
}
