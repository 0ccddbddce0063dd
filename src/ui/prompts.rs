//! ui::prompts
//!
//! Interactive prompts answered from the command line buffer.
//!
//! # Design
//!
//! Prompts read their answer from the same [`LineBuffer`] the command loop
//! reads commands from, so typed-ahead input is consumed in order. Prompts
//! are only shown in interactive mode. In non-interactive mode, operations
//! requiring user input must either have defaults or fail with a clear
//! error message.

use thiserror::Error;

use super::output::Console;
use crate::queue::LineBuffer;

/// Errors from prompts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("prompt cancelled: input ended")]
    Cancelled,

    #[error("not in interactive mode")]
    NotInteractive,
}

/// Prompt to select from a list of options.
///
/// The answer may be the option text or its 1-based number. Invalid
/// answers re-ask. Returns the index of the selected option.
///
/// # Errors
///
/// - [`PromptError::NotInteractive`] if prompts are disabled
/// - [`PromptError::Cancelled`] if input ends before a valid answer
pub async fn select<T: AsRef<str>>(
    console: &Console,
    input: &LineBuffer,
    message: &str,
    options: &[T],
    interactive: bool,
) -> Result<usize, PromptError> {
    if !interactive {
        return Err(PromptError::NotInteractive);
    }

    let choices = options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("{}. {}", i + 1, option.as_ref()))
        .collect::<Vec<_>>()
        .join("  ");

    loop {
        console.print(message);
        console.print(&choices);

        let answer = input
            .take_line()
            .await
            .map_err(|_| PromptError::Cancelled)?;
        if let Some(index) = parse_choice(answer.trim(), options) {
            return Ok(index);
        }
        console.warn(format!("'{}' is not one of the choices", answer.trim()));
    }
}

fn parse_choice<T: AsRef<str>>(answer: &str, options: &[T]) -> Option<usize> {
    if let Ok(n) = answer.parse::<usize>() {
        return (1..=options.len()).contains(&n).then(|| n - 1);
    }
    options
        .iter()
        .position(|option| option.as_ref().eq_ignore_ascii_case(answer))
}
