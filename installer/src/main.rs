//! `rb-install` entrypoint.
//!
//! Parses the command line, snapshots the environment, sets up logging, and
//! hands over to [`Installer`]. The process exits with the status the run
//! produced: 0, the status of a failed `ruby-build`, 1 for errors, or
//! `128 + signal` after an interrupt.

use rb_install::cli::{ParseOutcome, parse};
use rb_install::collaborators::{RbenvCollaborators, SystemCommandExecutor};
use rb_install::config::InstallEnv;
use rb_install::dirs::SystemBaseDirs;
use rb_install::error::Result;
use rb_install::install_flow::Installer;
use rb_install::output::{tool_message, usage_error_text, write_stderr_line};
use rb_install::prompt::TerminalPrompter;
use rb_install::runner::Colorizer;
use std::ffi::OsString;
use std::io::Write;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_LEVEL: &str = "warn";
const DEBUG_LOG_LEVEL: &str = "debug";

fn main() {
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(std::env::args_os().skip(1), &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(
    args: impl IntoIterator<Item = OsString>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32> {
    let outcome = parse(args)?;
    let env = InstallEnv::from_process(&SystemBaseDirs)?;
    init_logging(&log_directive(&env, &outcome));

    let collaborators = RbenvCollaborators::new(SystemCommandExecutor, env.builder.clone());
    Installer::new(&env, &collaborators, &TerminalPrompter)
        .with_colors(Colorizer::detect(env.no_color))
        .trap_signals(true)
        .run(outcome, stdout, stderr)
}

/// `RB_INSTALL_LOG` wins; otherwise `debug` when `RBENV_DEBUG` or `-D` asked
/// for it, else `warn`.
fn log_directive(env: &InstallEnv, outcome: &ParseOutcome) -> String {
    if let Some(directive) = &env.log_directive {
        return directive.clone();
    }
    let debug_flag = matches!(outcome, ParseOutcome::Install(options) if options.debug);
    if env.debug || debug_flag {
        DEBUG_LOG_LEVEL.to_owned()
    } else {
        DEFAULT_LOG_LEVEL.to_owned()
    }
}

fn init_logging(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_err()
    {
        // A subscriber is already installed.
    }
}

fn exit_code_for_run_result(result: Result<i32>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) if err.is_usage() => {
            write_stderr_line(stderr, usage_error_text(&err));
            err.exit_code()
        }
        Err(err) => {
            write_stderr_line(stderr, tool_message(&err));
            err.exit_code()
        }
    }
}
