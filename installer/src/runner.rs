//! Output channels and execution of the delegated build.
//!
//! Status messages always go to the original stderr through [`Logger`].
//! Build output goes to an [`OutputSink`]: the terminal in verbose mode, a
//! per-run log file otherwise. [`CommandRunner`] reports the child's exit
//! status as data; deciding what a failure means is left to the caller.

use crate::cancel::CancellationToken;
use crate::cli::TOOL_NAME;
use crate::error::{InstallerError, Result};
use crate::output::write_stderr_line;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use console::Style;
use log::debug;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{IsTerminal, Write};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Exit status reported when the program cannot be found, as a shell would.
pub const COMMAND_NOT_FOUND: i32 = 127;

/// Log file path for one run: `{tmp}/{tool}.{YYYYmmddHHMMSS}.{pid}.log`.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use chrono::{Local, TimeZone};
/// use rb_install::runner::log_file_path;
///
/// let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
/// let path = log_file_path(Utf8Path::new("/tmp"), at, 4242);
/// assert_eq!(path, "/tmp/rb-install.20240309140507.4242.log");
/// ```
#[must_use]
pub fn log_file_path(tmp_dir: &Utf8Path, now: DateTime<Local>, pid: u32) -> Utf8PathBuf {
    tmp_dir.join(format!(
        "{TOOL_NAME}.{}.{pid}.log",
        now.format("%Y%m%d%H%M%S")
    ))
}

/// Append-only build log.
#[derive(Debug)]
pub struct LogFile {
    path: Utf8PathBuf,
    file: File,
}

impl LogFile {
    /// Creates (or appends to) the log at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn create(path: Utf8PathBuf) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Path of the log.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// Where build output goes.
#[derive(Debug)]
pub enum OutputSink {
    /// The invoking terminal.
    Terminal,
    /// A log file.
    LogFile(LogFile),
}

impl OutputSink {
    /// Path of the log file, if output is being logged.
    #[must_use]
    pub fn log_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Terminal => None,
            Self::LogFile(log) => Some(log.path()),
        }
    }

    fn stdio(&self) -> Result<(Stdio, Stdio)> {
        match self {
            Self::Terminal => Ok((Stdio::inherit(), Stdio::inherit())),
            Self::LogFile(log) => Ok((log.file.try_clone()?.into(), log.file.try_clone()?.into())),
        }
    }

    /// Writes a line to the build output channel.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::WriteFailed`] if the line cannot be written.
    pub fn annotate(&mut self, message: impl fmt::Display) -> Result<()> {
        let written = match self {
            Self::Terminal => writeln!(std::io::stderr(), "{message}"),
            Self::LogFile(log) => writeln!(log.file, "{message}"),
        };
        written.map_err(|source| InstallerError::WriteFailed { source })
    }

    /// Removes the log file, if any.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be removed.
    pub fn discard(self) -> Result<()> {
        match self {
            Self::Terminal => Ok(()),
            Self::LogFile(log) => match std::fs::remove_file(&log.path) {
                Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
                _ => Ok(()),
            },
        }
    }
}

/// ANSI styling applied only when stdout is a terminal and colour is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Colorizer {
    enabled: bool,
}

impl Colorizer {
    /// Colour when stdout is a terminal and `no_color` is false.
    #[must_use]
    pub fn detect(no_color: bool) -> Self {
        Self::new(!no_color && std::io::stdout().is_terminal())
    }

    /// Colour exactly when `enabled`.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Whether styling is applied.
    #[must_use]
    pub const fn enabled(self) -> bool {
        self.enabled
    }

    /// Styles `text`, or returns it unchanged when colour is off.
    #[must_use]
    pub fn paint(self, style: &Style, text: &str) -> String {
        if self.enabled {
            style.clone().force_styling(true).apply_to(text).to_string()
        } else {
            text.to_owned()
        }
    }
}

/// Writes status lines to the original stderr, whatever the output sink.
pub struct Logger<'a> {
    stderr: &'a mut dyn Write,
    colors: Colorizer,
}

impl<'a> Logger<'a> {
    /// Wraps the original error stream.
    pub fn new(stderr: &'a mut dyn Write, colors: Colorizer) -> Self {
        Self { stderr, colors }
    }

    /// The colour setting in use.
    #[must_use]
    pub const fn colors(&self) -> Colorizer {
        self.colors
    }

    /// Writes one plain line.
    pub fn line(&mut self, message: impl fmt::Display) {
        write_stderr_line(self.stderr, message);
    }

    /// Writes one line in `style`.
    pub fn styled(&mut self, style: &Style, message: &str) {
        let painted = self.colors.paint(style, message);
        self.line(painted);
    }

    /// Echoes a command line about to run.
    pub fn command(&mut self, command: &CommandLine) {
        self.styled(&Style::new().cyan(), &format!("+ {command}"));
    }
}

/// A program with arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Program to run.
    pub program: String,
    /// Arguments in order.
    pub args: Vec<String>,
    /// Variables added to the inherited environment.
    pub env: Vec<(String, String)>,
}

impl CommandLine {
    /// A command with no arguments or extra environment.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.envs(self.env.iter().map(|(key, value)| (key, value)));
        command
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Outcome of the delegated build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit status of the child.
    pub status: i32,
    /// Log file the output went to, if any.
    pub log_path: Option<Utf8PathBuf>,
}

impl ExecutionResult {
    /// Whether the child exited with status 0.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.status == 0
    }
}

/// Runs one child at a time, watching for cancellation.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    token: CancellationToken,
    poll_interval: Duration,
}

impl CommandRunner {
    /// Runner that polls `token` while waiting.
    #[must_use]
    pub const fn new(token: CancellationToken) -> Self {
        Self {
            token,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Echoes `command`, runs it with output routed to `sink`, and returns
    /// its exit status.
    ///
    /// A non-zero status is noted in the sink but not treated as an error.
    /// A program that cannot be found yields status 127.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Interrupted`] when the token is cancelled
    /// before the child starts or while it runs (the child is killed and
    /// reaped first), or an I/O
    /// error if the child cannot be started or waited on.
    pub fn capture_command(
        &self,
        command: &CommandLine,
        sink: &mut OutputSink,
        logger: &mut Logger<'_>,
    ) -> Result<ExecutionResult> {
        self.token.check()?;
        logger.command(command);
        let (stdout, stderr) = sink.stdio()?;
        let spawned = command.to_command().stdout(stdout).stderr(stderr).spawn();

        let status = match spawned {
            Ok(child) => self.wait(child)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                sink.annotate(format!("{}: command not found", command.program))?;
                COMMAND_NOT_FOUND
            }
            Err(err) => return Err(err.into()),
        };

        if status != 0 {
            sink.annotate(format!("{} exited with status {status}", command.program))?;
        }
        Ok(ExecutionResult {
            status,
            log_path: sink.log_path().map(Utf8Path::to_path_buf),
        })
    }

    fn wait(&self, mut child: Child) -> Result<i32> {
        loop {
            if let Some(status) = child.wait_timeout(self.poll_interval)? {
                return Ok(exit_code(status));
            }
            if let Some(signal) = self.token.signal() {
                debug!("cancelling child {} after signal {signal}", child.id());
                let _ = child.kill();
                child.wait()?;
                return Err(InstallerError::Interrupted { signal });
            }
        }
    }
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
