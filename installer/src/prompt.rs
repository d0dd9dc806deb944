//! Overwrite confirmation.

use crate::error::{InstallerError, Result};
use std::io::IsTerminal;

/// Asks the user before an existing installation is overwritten.
#[cfg_attr(test, mockall::automock)]
pub trait Prompter {
    /// Whether a human can answer, i.e. stdin is a terminal.
    fn is_interactive(&self) -> bool;

    /// Asks `question`; `false` unless the user answers yes.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Prompt`] when the terminal cannot be read.
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// [`Prompter`] on the controlling terminal, via `dialoguer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    fn confirm(&self, question: &str) -> Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(question)
            .default(false)
            .interact()
            .map_err(|source| InstallerError::Prompt { source })
    }
}
