//! Shared test utilities for the installer crate.

use crate::collaborators::CommandExecutor;
use crate::error::{InstallerError, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with the given stdout.
#[must_use]
pub fn stdout_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// What a stubbed invocation answers with.
#[derive(Debug)]
pub enum StubResponse {
    /// Answer to [`CommandExecutor::run`].
    Captured(Result<Output>),
    /// Exit code answered to [`CommandExecutor::run_inherited`].
    Inherited(i32),
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "rbenv").
    pub cmd: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<&'static str>,
    /// The response returned when this command is invoked.
    pub response: StubResponse,
}

impl ExpectedCall {
    /// Expects a captured run answering `result`.
    #[must_use]
    pub fn new(cmd: &'static str, args: &[&'static str], result: Result<Output>) -> Self {
        Self {
            cmd,
            args: args.to_vec(),
            response: StubResponse::Captured(result),
        }
    }

    /// Expects an inherited-stdio run exiting with `code`.
    #[must_use]
    pub fn inherited(cmd: &'static str, args: &[&'static str], code: i32) -> Self {
        Self {
            cmd,
            args: args.to_vec(),
            response: StubResponse::Inherited(code),
        }
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }

    fn next_call(&self, cmd: &str, args: &[&str]) -> Result<StubResponse> {
        let call = self
            .expected
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| InstallerError::StubMismatch {
                message: format!("unexpected invocation: {cmd} {}", args.join(" ")),
            })?;
        if call.cmd != cmd || call.args.as_slice() != args {
            return Err(InstallerError::StubMismatch {
                message: format!(
                    "expected `{} {}`, got `{cmd} {}`",
                    call.cmd,
                    call.args.join(" "),
                    args.join(" ")
                ),
            });
        }
        Ok(call.response)
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        match self.next_call(cmd, args)? {
            StubResponse::Captured(result) => result,
            StubResponse::Inherited(_) => Err(InstallerError::StubMismatch {
                message: format!("`{cmd}` expected an inherited run"),
            }),
        }
    }

    fn run_inherited(&self, cmd: &str, args: &[&str]) -> Result<ExitStatus> {
        match self.next_call(cmd, args)? {
            StubResponse::Inherited(code) => Ok(exit_status(code)),
            StubResponse::Captured(_) => Err(InstallerError::StubMismatch {
                message: format!("`{cmd}` expected a captured run"),
            }),
        }
    }
}

/// A temporary directory of executable shell scripts.
///
/// Used to stand in for `rbenv`, `ruby-build`, and hook commands.
#[cfg(unix)]
#[derive(Debug)]
pub struct FakeBinDir {
    dir: tempfile::TempDir,
}

#[cfg(unix)]
impl FakeBinDir {
    /// Creates an empty directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Path of the directory.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Writes an executable `/bin/sh` script called `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the script cannot be written or made executable.
    pub fn script(&self, name: &str, body: &str) -> std::io::Result<std::path::PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let path = self.dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    /// `PATH` value with this directory in front of the inherited one.
    #[must_use]
    pub fn path_env(&self) -> std::ffi::OsString {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let mut paths = vec![self.dir.path().to_path_buf()];
        paths.extend(std::env::split_paths(&inherited));
        std::env::join_paths(paths).unwrap_or(inherited)
    }
}
