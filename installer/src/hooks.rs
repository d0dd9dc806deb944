//! Before- and after-install hooks.
//!
//! Hooks come from two places: TOML manifests returned by `rbenv hooks
//! install`, and closures registered from Rust. Each phase keeps its hooks in
//! registration order and replays them in that order. The registry does not
//! catch hook failures; the first failing hook stops the phase and its error
//! is returned to the caller.
//!
//! A manifest looks like this:
//!
//! ```toml
//! version_name = "3.2.0-custom"
//! version_suffix = "-dev"
//!
//! [[before_install]]
//! command = "./fetch-patches"
//! args = ["--quiet"]
//!
//! [[after_install]]
//! command = "notify-send"
//! ```
//!
//! Relative commands containing a `/` resolve against the manifest's
//! directory. Command hooks see `DEFINITION`, `VERSION_NAME` and `PREFIX` in
//! their environment; after-install hooks also see `STATUS`.

use crate::error::{InstallerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use serde::Deserialize;
use std::fmt;
use std::process::Command;

/// The two points in a run where hooks fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// After the target is resolved, before `ruby-build` runs.
    BeforeInstall,
    /// After `ruby-build` returns, whatever its status.
    AfterInstall,
}

impl HookPhase {
    /// Manifest table name of the phase.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BeforeInstall => "before_install",
            Self::AfterInstall => "after_install",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a hook knows about the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContext {
    /// The definition handed to `ruby-build`.
    pub definition: String,
    /// Name of the installed version.
    pub version_name: String,
    /// Installation prefix.
    pub prefix: Utf8PathBuf,
    /// Exit status of `ruby-build`; `None` before it has run.
    pub status: Option<i32>,
}

impl HookContext {
    fn env(&self) -> Vec<(&'static str, String)> {
        let mut env = vec![
            ("DEFINITION", self.definition.clone()),
            ("VERSION_NAME", self.version_name.clone()),
            ("PREFIX", self.prefix.to_string()),
        ];
        if let Some(status) = self.status {
            env.push(("STATUS", status.to_string()));
        }
        env
    }
}

/// A closure hook.
pub type HookCallback = Box<dyn Fn(&HookContext) -> Result<()>>;

/// A program run as a hook.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CommandHook {
    /// Program to run.
    pub command: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Contents of one hook manifest.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HookManifest {
    /// Replaces the version name derived from the definition.
    pub version_name: Option<String>,
    /// Appended to the version name.
    pub version_suffix: Option<String>,
    /// Hooks run before the build.
    pub before_install: Vec<CommandHook>,
    /// Hooks run after the build.
    pub after_install: Vec<CommandHook>,
}

impl HookManifest {
    /// Parses manifest text read from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidHookManifest`] for malformed TOML or
    /// unknown keys.
    pub fn parse(path: &Utf8Path, contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|err| InstallerError::InvalidHookManifest {
            path: path.to_path_buf(),
            reason: err.message().to_owned(),
        })
    }
}

enum HookBody {
    Command { program: String, args: Vec<String> },
    Callback(HookCallback),
}

/// One registered hook.
pub struct Hook {
    label: String,
    body: HookBody,
}

impl Hook {
    /// A hook that runs `program` with `args`.
    #[must_use]
    pub fn command(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        Self {
            label: program.clone(),
            body: HookBody::Command { program, args },
        }
    }

    /// A hook that calls `callback`, named `label` in error messages.
    pub fn callback<F>(label: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&HookContext) -> Result<()> + 'static,
    {
        Self {
            label: label.into(),
            body: HookBody::Callback(Box::new(callback)),
        }
    }

    /// Name shown in logs and errors.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    fn run(&self, phase: HookPhase, context: &HookContext) -> Result<()> {
        match &self.body {
            HookBody::Callback(callback) => callback(context).map_err(|err| match err {
                InstallerError::Interrupted { .. } | InstallerError::HookFailed { .. } => err,
                other => self.failure(phase, other.to_string()),
            }),
            HookBody::Command { program, args } => {
                let status = Command::new(program)
                    .args(args)
                    .envs(context.env())
                    .status()
                    .map_err(|err| self.failure(phase, err.to_string()))?;
                if status.success() {
                    Ok(())
                } else {
                    Err(self.failure(phase, format!("exited with {status}")))
                }
            }
        }
    }

    fn failure(&self, phase: HookPhase, reason: String) -> InstallerError {
        InstallerError::HookFailed {
            phase: phase.label(),
            hook: self.label.clone(),
            reason,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            HookBody::Command { .. } => "command",
            HookBody::Callback(_) => "callback",
        };
        f.debug_struct("Hook")
            .field("label", &self.label)
            .field("kind", &kind)
            .finish()
    }
}

/// Ordered before- and after-install hooks plus version-name overrides.
#[derive(Debug, Default)]
pub struct HookRegistry {
    before: Vec<Hook>,
    after: Vec<Hook>,
    version_name: Option<String>,
    version_suffix: Option<String>,
}

impl HookRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a closure to the before-install phase.
    pub fn before_install<F>(&mut self, label: impl Into<String>, callback: F)
    where
        F: Fn(&HookContext) -> Result<()> + 'static,
    {
        self.register(HookPhase::BeforeInstall, Hook::callback(label, callback));
    }

    /// Appends a closure to the after-install phase.
    pub fn after_install<F>(&mut self, label: impl Into<String>, callback: F)
    where
        F: Fn(&HookContext) -> Result<()> + 'static,
    {
        self.register(HookPhase::AfterInstall, Hook::callback(label, callback));
    }

    /// Appends `hook` to `phase`.
    pub fn register(&mut self, phase: HookPhase, hook: Hook) {
        debug!("registered {phase} hook {}", hook.label());
        match phase {
            HookPhase::BeforeInstall => self.before.push(hook),
            HookPhase::AfterInstall => self.after.push(hook),
        }
    }

    /// Loads every manifest in `paths`, in order.
    ///
    /// Paths without a `.toml` extension are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns the first manifest that cannot be read or parsed.
    pub fn load(&mut self, paths: &[Utf8PathBuf]) -> Result<()> {
        for path in paths {
            if path.extension() == Some("toml") {
                self.load_manifest(path)?;
            } else {
                warn!("skipping hook {path}: only .toml hook manifests are supported");
            }
        }
        Ok(())
    }

    /// Reads and applies one manifest.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidHookManifest`] if the file cannot be
    /// read or parsed.
    pub fn load_manifest(&mut self, path: &Utf8Path) -> Result<()> {
        let contents =
            std::fs::read_to_string(path).map_err(|err| InstallerError::InvalidHookManifest {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        let manifest = HookManifest::parse(path, &contents)?;
        self.apply(manifest, path.parent());
        Ok(())
    }

    /// Registers a manifest's hooks and overrides.
    ///
    /// Later manifests replace earlier `version_name` and `version_suffix`
    /// values.
    pub fn apply(&mut self, manifest: HookManifest, base: Option<&Utf8Path>) {
        if manifest.version_name.is_some() {
            self.version_name = manifest.version_name;
        }
        if manifest.version_suffix.is_some() {
            self.version_suffix = manifest.version_suffix;
        }
        for (phase, hooks) in [
            (HookPhase::BeforeInstall, manifest.before_install),
            (HookPhase::AfterInstall, manifest.after_install),
        ] {
            for hook in hooks {
                let program = resolve_program(&hook.command, base);
                self.register(phase, Hook::command(program, hook.args));
            }
        }
    }

    /// Version name set by a manifest, if any.
    #[must_use]
    pub fn version_name_override(&self) -> Option<&str> {
        self.version_name.as_deref()
    }

    /// Suffix appended to the version name, if any.
    #[must_use]
    pub fn version_suffix(&self) -> Option<&str> {
        self.version_suffix.as_deref()
    }

    /// Number of hooks registered for `phase`.
    #[must_use]
    pub fn len(&self, phase: HookPhase) -> usize {
        self.hooks(phase).len()
    }

    /// Whether no hooks are registered in either phase.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    /// Runs the hooks of `phase` in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first hook failure; later hooks in the phase do not run.
    pub fn run(&self, phase: HookPhase, context: &HookContext) -> Result<()> {
        for hook in self.hooks(phase) {
            debug!("running {phase} hook {}", hook.label());
            hook.run(phase, context)?;
        }
        Ok(())
    }

    fn hooks(&self, phase: HookPhase) -> &[Hook] {
        match phase {
            HookPhase::BeforeInstall => &self.before,
            HookPhase::AfterInstall => &self.after,
        }
    }
}

fn resolve_program(command: &str, base: Option<&Utf8Path>) -> String {
    let path = Utf8Path::new(command);
    match base {
        Some(base) if command.contains('/') && path.is_relative() => base.join(path).into_string(),
        _ => command.to_owned(),
    }
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
