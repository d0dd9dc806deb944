//! `rb-install` library.
//!
//! Installs a Ruby version into an rbenv root by delegating the build to
//! `ruby-build`. The crate owns the option parsing, the hook lifecycle around
//! the build, log routing, and cleanup of partial installations. It backs the
//! `rb-install` binary and can be driven directly in tests.
//!
//! # Modules
//!
//! - [`builder`] - The request and argument vector handed to `ruby-build`
//! - [`cancel`] - Interrupt token and signal wiring
//! - [`cleanup`] - Prefix state and the cleanup guard
//! - [`cli`] - Option table, parser, and help rendering
//! - [`collaborators`] - External `rbenv` and `ruby-build` commands
//! - [`config`] - Environment snapshot
//! - [`dirs`] - Platform base directories
//! - [`error`] - Error taxonomy and exit codes
//! - [`hooks`] - Hook manifests and registry
//! - [`install_flow`] - The installation state machine
//! - [`output`] - User-facing messages
//! - [`prompt`] - Overwrite confirmation
//! - [`runner`] - Output sinks, status logger, and command runner

pub mod builder;
pub mod cancel;
pub mod cleanup;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod dirs;
pub mod error;
pub mod hooks;
pub mod install_flow;
pub mod output;
pub mod prompt;
pub mod runner;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
