//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! All user-facing text goes through a [`Console`]. Output respects the
//! quiet flag; errors are always shown. A console can capture its output
//! instead of printing it, which is how tests observe what a command said.

use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

#[derive(Debug, Clone)]
enum Sink {
    Terminal,
    Captured(Arc<Mutex<Vec<String>>>),
}

/// Destination for user-facing text.
#[derive(Debug, Clone)]
pub struct Console {
    verbosity: Verbosity,
    sink: Sink,
}

impl Console {
    /// Console writing to stdout/stderr.
    pub fn terminal(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            sink: Sink::Terminal,
        }
    }

    /// Console recording every line it is asked to show.
    pub fn captured() -> Self {
        Self {
            verbosity: Verbosity::Normal,
            sink: Sink::Captured(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Lines recorded by a captured console; empty for a terminal console.
    pub fn lines(&self) -> Vec<String> {
        match &self.sink {
            Sink::Terminal => Vec::new(),
            Sink::Captured(lines) => lines.lock().clone(),
        }
    }

    /// Captured output joined with newlines.
    pub fn transcript(&self) -> String {
        self.lines().join("\n")
    }

    fn emit(&self, text: String, to_stderr: bool) {
        match &self.sink {
            Sink::Terminal if to_stderr => eprintln!("{}", text),
            Sink::Terminal => println!("{}", text),
            Sink::Captured(lines) => lines.lock().push(text),
        }
    }

    /// Print a message (respects quiet mode).
    pub fn print(&self, message: impl Display) {
        if self.verbosity != Verbosity::Quiet {
            self.emit(message.to_string(), false);
        }
    }

    /// Print an error message (always shown).
    pub fn error(&self, message: impl Display) {
        self.emit(format!("error: {}", message), true);
    }

    /// Print a warning message (respects quiet mode).
    pub fn warn(&self, message: impl Display) {
        if self.verbosity != Verbosity::Quiet {
            self.emit(format!("warning: {}", message), true);
        }
    }

    /// Redraw the prompt followed by any partially typed input.
    ///
    /// Captured consoles do not record prompts.
    pub fn prompt(&self, branch: impl Display, partial: &str) {
        if let Sink::Terminal = self.sink {
            if self.verbosity != Verbosity::Quiet {
                print!("{}> {}", branch, partial);
                let _ = std::io::stdout().flush();
            }
        }
    }

    /// End a prompt line that output is about to interrupt.
    pub fn interrupt_prompt(&self) {
        if let Sink::Terminal = self.sink {
            if self.verbosity != Verbosity::Quiet {
                println!();
            }
        }
    }
}
