//! The installation state machine.
//!
//! [`Installer::run`] takes a parsed command line through these phases, in
//! order and without going back:
//!
//! 1. load hook manifests and resolve the definition and version name;
//! 2. check for an existing installation (prompt, skip or force);
//! 3. prepare the `ruby-build` request and environment;
//! 4. run before-install hooks;
//! 5. arm the cleanup guard and signal handlers;
//! 6. run `ruby-build`;
//! 7. run after-install hooks with the build status;
//! 8. finalise: rehash and suggest a default on success, or clean up and
//!    report on failure.
//!
//! A failing build is carried as a status until step 8. An interrupt after
//! step 5 removes a prefix this run created and ends the run with
//! [`InstallerError::Interrupted`].

use crate::builder::{BuildRequest, derive_version_name};
use crate::cancel::{CancellationToken, arm_signal_handlers};
use crate::cleanup::{CleanupGuard, PrefixState};
use crate::cli::{InstallOptions, ParseOutcome, render_help};
use crate::collaborators::Collaborators;
use crate::config::InstallEnv;
use crate::error::{InstallerError, Result};
use crate::hooks::{HookContext, HookPhase, HookRegistry};
use crate::output::{
    DEFINITION_NOT_FOUND, FailureReport, LOG_TAIL_LINES, candidate_definitions_message,
    default_version_note, log_tail, overwrite_question, tool_message,
};
use crate::prompt::Prompter;
use crate::runner::{
    Colorizer, CommandRunner, ExecutionResult, LogFile, Logger, OutputSink, log_file_path,
};
use chrono::Local;
use console::Style;
use log::{debug, warn};
use std::io::Write;

/// Drives one `rb-install` run.
pub struct Installer<'a> {
    env: &'a InstallEnv,
    collaborators: &'a dyn Collaborators,
    prompter: &'a dyn Prompter,
    hooks: HookRegistry,
    token: CancellationToken,
    colors: Colorizer,
    trap_signals: bool,
}

impl<'a> Installer<'a> {
    /// An installer with no hooks that does not touch signal handlers.
    #[must_use]
    pub fn new(
        env: &'a InstallEnv,
        collaborators: &'a dyn Collaborators,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            env,
            collaborators,
            prompter,
            hooks: HookRegistry::new(),
            token: CancellationToken::new(),
            colors: Colorizer::new(false),
            trap_signals: false,
        }
    }

    /// Replaces the hook registry; discovered manifests are added to it.
    #[must_use]
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    /// Uses `token` for cancellation.
    #[must_use]
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Sets status-line colouring.
    #[must_use]
    pub fn with_colors(mut self, colors: Colorizer) -> Self {
        self.colors = colors;
        self
    }

    /// Routes SIGINT and SIGTERM into the token once the build is about to
    /// start.
    #[must_use]
    pub fn trap_signals(mut self, enabled: bool) -> Self {
        self.trap_signals = enabled;
        self
    }

    /// Runs the parsed command line and returns the process exit status.
    ///
    /// # Errors
    ///
    /// Returns usage errors, a declined or impossible confirmation, hook
    /// failures, collaborator failures, and [`InstallerError::Interrupted`].
    /// A failing `ruby-build` is not an error: its status is returned.
    pub fn run(
        mut self,
        outcome: ParseOutcome,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<i32> {
        match outcome {
            ParseOutcome::Help => {
                write_help(stdout)?;
                Ok(0)
            }
            ParseOutcome::Delegate(exit) => {
                debug!("delegating {:?} to {}", exit, self.env.builder);
                self.collaborators.delegate(exit)
            }
            ParseOutcome::Install(options) => self.install(&options, stderr),
        }
    }

    fn install(&mut self, options: &InstallOptions, stderr: &mut dyn Write) -> Result<i32> {
        let mut logger = Logger::new(stderr, self.colors);

        let hook_paths = self.collaborators.hook_paths()?;
        self.hooks.load(&hook_paths)?;

        let definition = options
            .definition
            .clone()
            .or_else(|| self.collaborators.local_version())
            .ok_or(InstallerError::NoDefinition)?;
        let version_name = derive_version_name(
            &definition,
            self.hooks.version_name_override(),
            self.hooks.version_suffix(),
        );
        let request = BuildRequest::new(options, definition, version_name, self.env);
        debug!("resolved {} to {}", request.definition, request.prefix);

        let state = PrefixState::capture(request.prefix.clone());
        if state.is_installed() {
            if options.skip_existing {
                debug!("{} is already installed; skipping", request.prefix);
                return Ok(0);
            }
            if !options.force {
                self.confirm_overwrite(&state)?;
            }
        }

        let default_version = self.collaborators.global_version();
        let command = request.command_line(self.env, default_version.as_deref());

        let context = HookContext {
            definition: request.definition.clone(),
            version_name: request.version_name.clone(),
            prefix: request.prefix.clone(),
            status: None,
        };
        self.hooks.run(HookPhase::BeforeInstall, &context)?;

        if self.trap_signals {
            arm_signal_handlers(&self.token)?;
        }
        let guard = CleanupGuard::arm(state);

        self.token.check()?;
        let mut sink = self.open_sink(options.verbose)?;
        let result = CommandRunner::new(self.token.clone()).capture_command(
            &command,
            &mut sink,
            &mut logger,
        )?;

        self.token.check()?;
        let after = HookContext {
            status: Some(result.status),
            ..context
        };
        if let Err(err) = self.hooks.run(HookPhase::AfterInstall, &after) {
            // A signal also reaches hook children; report it as an interrupt.
            self.token.check()?;
            if result.succeeded() {
                guard.disarm();
            }
            return Err(err);
        }
        self.token.check()?;

        if result.succeeded() {
            guard.disarm();
            sink.discard()?;
            self.finish_success(&request.version_name, default_version.as_deref(), &mut logger);
            Ok(0)
        } else {
            match guard.cleanup() {
                Ok(true) => debug!("removed partial installation {}", request.prefix),
                Ok(false) => {}
                Err(err) => warn!("could not remove {}: {err}", request.prefix),
            }
            self.report_failure(&request, &result, &mut logger)?;
            Ok(result.status)
        }
    }

    fn confirm_overwrite(&self, state: &PrefixState) -> Result<()> {
        let prefix = state.path().to_path_buf();
        if !self.prompter.is_interactive() {
            return Err(InstallerError::NonInteractive { prefix });
        }
        if self.prompter.confirm(&overwrite_question(&prefix))? {
            Ok(())
        } else {
            Err(InstallerError::ConfirmationDeclined { prefix })
        }
    }

    fn open_sink(&self, verbose: bool) -> Result<OutputSink> {
        if verbose {
            return Ok(OutputSink::Terminal);
        }
        let path = log_file_path(&self.env.tmp_dir, Local::now(), std::process::id());
        debug!("logging build output to {path}");
        Ok(OutputSink::LogFile(LogFile::create(path)?))
    }

    fn finish_success(
        &self,
        version_name: &str,
        default_version: Option<&str>,
        logger: &mut Logger<'_>,
    ) {
        if let Err(err) = self.collaborators.rehash() {
            logger.line(tool_message(format!("warning: {err}")));
        }
        if default_version != Some(version_name) {
            logger.line(default_version_note(version_name));
        }
    }

    fn report_failure(
        &self,
        request: &BuildRequest,
        result: &ExecutionResult,
        logger: &mut Logger<'_>,
    ) -> Result<()> {
        let tail = match &result.log_path {
            Some(path) => log_tail(path, LOG_TAIL_LINES)?,
            None => None,
        };
        let report = FailureReport {
            definition: &request.definition,
            status: result.status,
            log: result.log_path.as_deref().zip(tail),
        };

        logger.line("");
        logger.styled(&Style::new().red().bold(), &report.banner());
        for line in report.details() {
            logger.line(line);
        }

        if result.status == DEFINITION_NOT_FOUND {
            match self.collaborators.definitions() {
                Ok(candidates) => {
                    logger.line(candidate_definitions_message(&request.definition, &candidates));
                }
                Err(err) => debug!("could not list definitions: {err}"),
            }
        }
        Ok(())
    }
}

/// Writes the usage summary and long-form help.
///
/// # Errors
///
/// Returns [`InstallerError::WriteFailed`] if `stdout` rejects the text.
pub fn write_help(stdout: &mut dyn Write) -> Result<()> {
    writeln!(stdout, "{}", render_help())
        .map_err(|source| InstallerError::WriteFailed { source })
}

#[cfg(test)]
#[path = "install_flow_tests.rs"]
mod tests;
