//! engine::command
//!
//! Grammar of the lines typed at the prompt.
//!
//! Lines are split on whitespace and parsed with clap, without a binary
//! name, so unknown commands and bad arguments produce clap's own messages.

use clap::{CommandFactory, Parser, Subcommand};

/// One command line.
#[derive(Parser, Debug)]
#[command(
    name = "trellis",
    no_binary_name = true,
    disable_help_subcommand = true,
    disable_help_flag = true,
    disable_version_flag = true,
    override_usage = "<COMMAND> [ARGS]..."
)]
struct CommandLine {
    #[command(subcommand)]
    command: ReplCommand,
}

/// Commands understood by the prompt.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// List branches, or switch to an existing branch
    Branch {
        /// Branch to switch to
        name: Option<String>,
    },

    /// Copy the current branch under a new name and switch to it
    Fork {
        /// Name of the new branch
        name: String,
    },

    /// Merge another branch into the current one
    Merge {
        /// Branch to merge from
        from: String,
    },

    /// Rename a term or type
    Rename {
        /// Existing name (a suffix is enough if it is unique)
        from: String,
        /// New name
        to: String,
    },

    /// Add the definitions of the last checked source file
    Add,

    /// List names in the current branch
    #[command(visible_alias = "ls")]
    Names {
        /// Only show names ending with this
        query: Option<String>,
    },

    /// Show this help
    Help,

    /// Leave the prompt
    #[command(visible_alias = "exit")]
    Quit,
}

/// Result of parsing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// The line held only whitespace.
    Blank,
    Command(ReplCommand),
    /// Text to show the user, with any leading `error: ` removed.
    Invalid(String),
}

/// Parse one command line.
pub fn parse_line(line: &str) -> Parsed {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Parsed::Blank;
    }

    match CommandLine::try_parse_from(tokens) {
        Ok(parsed) => Parsed::Command(parsed.command),
        Err(e) => {
            let rendered = e.render().to_string();
            let message = rendered
                .trim()
                .strip_prefix("error: ")
                .unwrap_or(rendered.trim())
                .to_string();
            Parsed::Invalid(message)
        }
    }
}

/// Help text listing every command.
pub fn help_text() -> String {
    CommandLine::command().render_help().to_string()
}
