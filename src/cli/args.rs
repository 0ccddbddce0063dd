//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Flags
//!
//! - `--codebase <dir>`: Codebase directory (default `.trellis`)
//! - `--branch <name>`: Branch to open instead of the configured default
//! - `--source-dir <dir>`: Directory watched for source files
//! - `--debounce-ms <n>`: Quiet interval for branch file changes
//! - `--debug`: Enable debug logging
//! - `--interactive` / `--no-interactive`: Control prompts
//! - `--quiet` / `-q`: Minimal output

use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

/// Default codebase directory.
pub const DEFAULT_CODEBASE: &str = ".trellis";

/// Trellis - an interactive command loop over a mergeable codebase
#[derive(Parser, Debug, Clone)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Codebase directory holding branches and config
    #[arg(long, default_value = DEFAULT_CODEBASE)]
    pub codebase: PathBuf,

    /// Branch to open
    #[arg(long)]
    pub branch: Option<String>,

    /// Directory watched for source files
    #[arg(long)]
    pub source_dir: Option<PathBuf>,

    /// Quiet interval for branch file changes, in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub debounce_ms: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Minimal output; implies --no-interactive
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable interactive prompts
    #[arg(long = "interactive", conflicts_with = "no_interactive")]
    pub interactive_flag: bool,

    /// Disable interactive prompts
    #[arg(long)]
    pub no_interactive: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Interactive mode, or `None` when no flag decides it.
    ///
    /// `--interactive` wins; `--no-interactive` and `--quiet` disable prompts.
    pub fn interactive_override(&self) -> Option<bool> {
        if self.interactive_flag {
            Some(true)
        } else if self.no_interactive || self.quiet {
            Some(false)
        } else {
            None
        }
    }
}

/// Whether stdin is a terminal.
pub fn stdin_is_terminal() -> bool {
    std::io::stdin().is_terminal()
}
