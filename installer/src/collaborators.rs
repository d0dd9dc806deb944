//! External `rbenv` and `ruby-build` commands.
//!
//! The orchestrator depends only on the [`Collaborators`] trait. The
//! production implementation, [`RbenvCollaborators`], runs each lookup as an
//! external command through a [`CommandExecutor`].

use crate::cli::EarlyExit;
use crate::error::{InstallerError, Result};
use camino::Utf8PathBuf;
use log::debug;
use std::process::{Command, ExitStatus, Output};

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the command.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rb_install::collaborators::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("rbenv", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), rb_install::error::InstallerError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output>;

    /// Runs a command attached to this process's stdio and returns its status.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning the command.
    fn run_inherited(&self, cmd: &str, args: &[&str]) -> Result<ExitStatus>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        Command::new(cmd)
            .args(args)
            .output()
            .map_err(InstallerError::from)
    }

    fn run_inherited(&self, cmd: &str, args: &[&str]) -> Result<ExitStatus> {
        Command::new(cmd)
            .args(args)
            .status()
            .map_err(InstallerError::from)
    }
}

/// Lookups and side effects delegated to `rbenv` and `ruby-build`.
#[cfg_attr(test, mockall::automock)]
pub trait Collaborators {
    /// The version configured for the current directory, if any.
    fn local_version(&self) -> Option<String>;

    /// The global default version, if any.
    fn global_version(&self) -> Option<String>;

    /// Hook files to load for the install command, in load order.
    ///
    /// # Errors
    ///
    /// Returns an error when discovery itself fails.
    fn hook_paths(&self) -> Result<Vec<Utf8PathBuf>>;

    /// Regenerates shims after an installation.
    ///
    /// # Errors
    ///
    /// Returns an error when the rehash command fails.
    fn rehash(&self) -> Result<()>;

    /// All definitions `ruby-build` knows about.
    ///
    /// # Errors
    ///
    /// Returns an error when the definitions cannot be listed.
    fn definitions(&self) -> Result<Vec<String>>;

    /// Runs an early-exit path with inherited stdio and returns its status.
    ///
    /// # Errors
    ///
    /// Returns an error when the builder cannot be started.
    fn delegate(&self, exit: EarlyExit) -> Result<i32>;
}

/// [`Collaborators`] backed by the `rbenv` and builder executables.
#[derive(Debug, Clone)]
pub struct RbenvCollaborators<E> {
    executor: E,
    builder: String,
}

impl<E: CommandExecutor> RbenvCollaborators<E> {
    /// Wraps `executor`, using `builder` as the `ruby-build` program.
    #[must_use]
    pub fn new(executor: E, builder: impl Into<String>) -> Self {
        Self {
            executor,
            builder: builder.into(),
        }
    }

    fn first_line(&self, cmd: &str, args: &[&str]) -> Option<String> {
        match self.executor.run(cmd, args) {
            Ok(output) if output.status.success() => String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned),
            Ok(output) => {
                debug!("`{cmd} {}` exited with {}", args.join(" "), output.status);
                None
            }
            Err(err) => {
                debug!("`{cmd} {}` could not run: {err}", args.join(" "));
                None
            }
        }
    }

    fn checked(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let output = self.executor.run(cmd, args)?;
        if output.status.success() {
            return Ok(output);
        }
        Err(InstallerError::Collaborator {
            command: format!("{cmd} {}", args.join(" ")),
            message: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

impl<E: CommandExecutor> Collaborators for RbenvCollaborators<E> {
    fn local_version(&self) -> Option<String> {
        self.first_line("rbenv", &["local"])
    }

    fn global_version(&self) -> Option<String> {
        self.first_line("rbenv", &["global"])
    }

    fn hook_paths(&self) -> Result<Vec<Utf8PathBuf>> {
        let output = self.checked("rbenv", &["hooks", "install"])?;
        Ok(non_empty_lines(&output.stdout)
            .map(Utf8PathBuf::from)
            .collect())
    }

    fn rehash(&self) -> Result<()> {
        self.checked("rbenv", &["rehash"]).map(|_| ())
    }

    fn definitions(&self) -> Result<Vec<String>> {
        let output = self.checked(&self.builder, &["--definitions"])?;
        Ok(non_empty_lines(&output.stdout).map(str::to_owned).collect())
    }

    fn delegate(&self, exit: EarlyExit) -> Result<i32> {
        let status = self
            .executor
            .run_inherited(&self.builder, exit.builder_args())?;
        Ok(status.code().unwrap_or(1))
    }
}

fn non_empty_lines(stdout: &[u8]) -> impl Iterator<Item = &str> {
    std::str::from_utf8(stdout)
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
}
