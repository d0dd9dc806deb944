//! The request handed to `ruby-build`.
//!
//! A [`BuildRequest`] is derived once from the parsed options, the resolved
//! definition and the environment, then turned into the delegated command
//! line. Nothing mutates it after construction.

use crate::cli::InstallOptions;
use crate::config::{CACHE_PATH_VAR, InstallEnv, ROOT_VAR, VERSION_VAR};
use crate::runner::CommandLine;
use camino::{Utf8Path, Utf8PathBuf};

/// Everything `ruby-build` needs for one installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Version number or path to a definition file.
    pub definition: String,
    /// Directory name under `versions/`.
    pub version_name: String,
    /// Installation prefix.
    pub prefix: Utf8PathBuf,
    /// Where sources are unpacked.
    pub src_dir: Utf8PathBuf,
    /// Whether `ruby-build` removes the sources afterwards.
    pub cleanup: bool,
    /// Whether a patch is piped in on stdin.
    pub has_patch: bool,
    /// Options forwarded verbatim, in parse order.
    pub passthrough_args: Vec<String>,
    /// Free-form arguments placed after `--`.
    pub extra_args: Vec<String>,
}

impl BuildRequest {
    /// Combines parsed options with the resolved target and environment.
    ///
    /// A `RUBY_BUILD_BUILD_PATH` override disables source cleanup whatever
    /// `-k`/`-c` said.
    #[must_use]
    pub fn new(
        options: &InstallOptions,
        definition: String,
        version_name: String,
        env: &InstallEnv,
    ) -> Self {
        Self {
            prefix: env.versions_dir().join(&version_name),
            src_dir: resolve_src_dir(options.src_dir.as_deref(), env),
            cleanup: options.cleanup && env.build_path.is_none(),
            has_patch: options.has_patch,
            passthrough_args: options.passthrough.clone(),
            extra_args: options.extra_args.clone(),
            definition,
            version_name,
        }
    }

    /// Arguments for `ruby-build`, in order:
    /// `[--cleanup] [--patch] --src-dir DIR --prefix PREFIX <passthrough>
    /// <definition> -- <extra>`.
    #[must_use]
    pub fn builder_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(8 + self.passthrough_args.len() + self.extra_args.len());
        if self.cleanup {
            args.push("--cleanup".to_owned());
        }
        if self.has_patch {
            args.push("--patch".to_owned());
        }
        args.extend([
            "--src-dir".to_owned(),
            self.src_dir.to_string(),
            "--prefix".to_owned(),
            self.prefix.to_string(),
        ]);
        args.extend(self.passthrough_args.iter().cloned());
        args.push(self.definition.clone());
        args.push("--".to_owned());
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// The full delegated command, including the exported environment.
    ///
    /// `default_version` is the global default from `rbenv global`.
    #[must_use]
    pub fn command_line(&self, env: &InstallEnv, default_version: Option<&str>) -> CommandLine {
        let mut command = CommandLine::new(env.builder.clone());
        command.args = self.builder_args();
        command.env = vec![
            (ROOT_VAR.to_owned(), env.root.to_string()),
            (VERSION_VAR.to_owned(), default_version.unwrap_or_default().to_owned()),
        ];
        if let Some(cache) = env.default_cache_path() {
            command.env.push((CACHE_PATH_VAR.to_owned(), cache.into_string()));
        }
        command
    }
}

/// Name of the installed version.
///
/// A manifest's `version_name` wins; otherwise the trailing path segment of
/// the definition is used. A manifest's `version_suffix` is then appended.
///
/// # Examples
///
/// ```
/// use rb_install::builder::derive_version_name;
///
/// assert_eq!(derive_version_name("3.2.0", None, None), "3.2.0");
/// assert_eq!(derive_version_name("defs/3.3.0-mine", None, Some("-dev")), "3.3.0-mine-dev");
/// assert_eq!(derive_version_name("3.2.0", Some("custom"), None), "custom");
/// ```
#[must_use]
pub fn derive_version_name(
    definition: &str,
    override_name: Option<&str>,
    suffix: Option<&str>,
) -> String {
    let base = override_name.unwrap_or_else(|| trailing_segment(definition));
    format!("{base}{}", suffix.unwrap_or_default())
}

fn trailing_segment(definition: &str) -> &str {
    Utf8Path::new(definition).file_name().unwrap_or(definition)
}

/// Source directory for the build.
///
/// First of: `--src-dir`, `RUBY_BUILD_SRC_DIR`, `RUBY_BUILD_BUILD_PATH`,
/// then `root/sources`.
#[must_use]
pub fn resolve_src_dir(explicit: Option<&Utf8Path>, env: &InstallEnv) -> Utf8PathBuf {
    explicit
        .map(Utf8Path::to_path_buf)
        .or_else(|| env.src_dir.clone())
        .or_else(|| env.build_path.clone())
        .unwrap_or_else(|| env.default_src_dir())
}
