//! Error types for the `rb-install` CLI.
//!
//! Usage-class errors abort the run before any hook or cleanup phase and map
//! to exit status 1. A failing `ruby-build` is deliberately absent here: its
//! status travels as data through the after-install hooks and is resolved when
//! the run is finalised.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while orchestrating an installation.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// An option spelling that appears in no option table entry.
    #[error("unknown option: {option}")]
    UnknownOption {
        /// The option as written on the command line.
        option: String,
    },

    /// An option that requires a value was given none.
    #[error("option {option} requires an argument")]
    MissingValue {
        /// The option as written on the command line.
        option: String,
    },

    /// A flag was given a value inline but takes none.
    #[error("option {option} does not take an argument")]
    UnexpectedValue {
        /// The option as written on the command line.
        option: String,
    },

    /// An argument that is not valid UTF-8.
    #[error("argument is not valid UTF-8: {argument}")]
    InvalidArgument {
        /// Lossy rendering of the argument.
        argument: String,
    },

    /// More than one version was named.
    #[error("expected at most one version argument, got {count}")]
    TooManyArguments {
        /// Number of positional arguments left after option values were taken.
        count: usize,
    },

    /// No version was named and no local version is configured.
    #[error("no version given and no local version configured")]
    NoDefinition,

    /// The target exists and stdin is not a terminal to ask for confirmation.
    #[error("{prefix} already exists; rerun with --force or --skip-existing")]
    NonInteractive {
        /// The existing installation prefix.
        prefix: Utf8PathBuf,
    },

    /// The user declined to overwrite an existing installation.
    #[error("installation into {prefix} cancelled")]
    ConfirmationDeclined {
        /// The existing installation prefix.
        prefix: Utf8PathBuf,
    },

    /// The install root could not be determined.
    #[error("could not determine install root; set RBENV_ROOT")]
    RootNotFound,

    /// A hook manifest could not be read or parsed.
    #[error("invalid hook manifest {path}: {reason}")]
    InvalidHookManifest {
        /// Path to the manifest.
        path: Utf8PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A before- or after-install hook failed.
    #[error("{phase} hook {hook} failed: {reason}")]
    HookFailed {
        /// `before_install` or `after_install`.
        phase: &'static str,
        /// Hook command or label.
        hook: String,
        /// Exit status or error text.
        reason: String,
    },

    /// An `rbenv` helper command failed.
    #[error("`{command}` failed: {message}")]
    Collaborator {
        /// The command line that was run.
        command: String,
        /// Trimmed stderr of the command.
        message: String,
    },

    /// The interactive prompt failed.
    #[error("failed to read confirmation")]
    Prompt {
        /// The underlying terminal error.
        #[source]
        source: dialoguer::Error,
    },

    /// The run was interrupted by a signal after the cleanup trap was armed.
    #[error("interrupted by signal {signal}")]
    Interrupted {
        /// Signal number that triggered cancellation.
        signal: i32,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl InstallerError {
    /// Returns true for errors caused by how the tool was invoked.
    ///
    /// The CLI prints the usage summary alongside these.
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::UnknownOption { .. }
                | Self::MissingValue { .. }
                | Self::UnexpectedValue { .. }
                | Self::InvalidArgument { .. }
                | Self::TooManyArguments { .. }
                | Self::NoDefinition
                | Self::NonInteractive { .. }
        )
    }

    /// Process exit status for this error.
    ///
    /// Interrupts exit with `128 + signal`, as a shell would report them.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted { signal } => 128 + *signal,
            _ => 1,
        }
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::unknown(InstallerError::UnknownOption { option: "--bogus".to_owned() }, true)]
    #[case::missing(InstallerError::MissingValue { option: "--jobs".to_owned() }, true)]
    #[case::too_many(InstallerError::TooManyArguments { count: 2 }, true)]
    #[case::no_definition(InstallerError::NoDefinition, true)]
    #[case::declined(
        InstallerError::ConfirmationDeclined { prefix: Utf8PathBuf::from("/r/versions/3.2.0") },
        false
    )]
    #[case::non_interactive(
        InstallerError::NonInteractive { prefix: Utf8PathBuf::from("/r/versions/3.2.0") },
        true
    )]
    fn usage_errors_are_classified(#[case] err: InstallerError, #[case] expected: bool) {
        assert_eq!(err.is_usage(), expected);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn interrupted_exit_code_follows_shell_convention() {
        let err = InstallerError::Interrupted { signal: 2 };
        assert_eq!(err.exit_code(), 130);
        assert!(err.to_string().contains("signal 2"));
    }

    #[test]
    fn non_interactive_suggests_flags() {
        let err = InstallerError::NonInteractive {
            prefix: Utf8PathBuf::from("/r/versions/3.2.0"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/r/versions/3.2.0"));
        assert!(msg.contains("--force"));
        assert!(msg.contains("--skip-existing"));
    }

    #[test]
    fn hook_failed_names_phase_and_hook() {
        let err = InstallerError::HookFailed {
            phase: "after_install",
            hook: "notify".to_owned(),
            reason: "exit status 3".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("after_install"));
        assert!(msg.contains("notify"));
        assert!(msg.contains("exit status 3"));
    }

    #[test]
    fn write_failed_preserves_source() {
        let err = InstallerError::WriteFailed {
            source: std::io::Error::other("broken pipe"),
        };
        assert!(err.to_string().contains("write"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
