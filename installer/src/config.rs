//! Environment configuration for an installation run.
//!
//! [`InstallEnv`] is read once at startup. Empty variables count as unset, so
//! `RBENV_ROOT=` behaves like an absent `RBENV_ROOT`.

use crate::dirs::BaseDirs;
use crate::error::{InstallerError, Result};
use camino::{Utf8Path, Utf8PathBuf};

/// Install root override.
pub const ROOT_VAR: &str = "RBENV_ROOT";
/// Build directory override; also disables source cleanup.
pub const BUILD_PATH_VAR: &str = "RUBY_BUILD_BUILD_PATH";
/// Source directory override.
pub const SRC_DIR_VAR: &str = "RUBY_BUILD_SRC_DIR";
/// Download cache passed to `ruby-build`.
pub const CACHE_PATH_VAR: &str = "RUBY_BUILD_CACHE_PATH";
/// Enables debug tracing when non-empty.
pub const DEBUG_VAR: &str = "RBENV_DEBUG";
/// `EnvFilter` directive overriding the log level.
pub const LOG_VAR: &str = "RB_INSTALL_LOG";
/// Temporary directory for the build log.
pub const TMPDIR_VAR: &str = "TMPDIR";
/// Disables ANSI colour when non-empty.
pub const NO_COLOR_VAR: &str = "NO_COLOR";
/// Alternative delegated builder program.
pub const BUILDER_VAR: &str = "RB_INSTALL_BUILDER";
/// Default version exported to the builder.
pub const VERSION_VAR: &str = "RBENV_VERSION";

const DEFAULT_BUILDER: &str = "ruby-build";
const DEFAULT_TMPDIR: &str = "/tmp";

/// Snapshot of the environment variables `rb-install` consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallEnv {
    /// Install root; versions live under `root/versions`.
    pub root: Utf8PathBuf,
    /// `RUBY_BUILD_BUILD_PATH`, when set.
    pub build_path: Option<Utf8PathBuf>,
    /// `RUBY_BUILD_SRC_DIR`, when set.
    pub src_dir: Option<Utf8PathBuf>,
    /// `RUBY_BUILD_CACHE_PATH`, when set.
    pub cache_path: Option<Utf8PathBuf>,
    /// Whether `RBENV_DEBUG` is set.
    pub debug: bool,
    /// `RB_INSTALL_LOG`, when set.
    pub log_directive: Option<String>,
    /// Directory for the per-run log file.
    pub tmp_dir: Utf8PathBuf,
    /// Whether `NO_COLOR` is set.
    pub no_color: bool,
    /// Program that performs the build.
    pub builder: String,
}

impl InstallEnv {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::RootNotFound`] when `RBENV_ROOT` is unset and
    /// no home directory is known.
    pub fn from_process(dirs: &dyn BaseDirs) -> Result<Self> {
        Self::from_lookup(dirs, |key| std::env::var(key).ok())
    }

    /// Builds the snapshot from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`InstallEnv::from_process`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rb_install::config::InstallEnv;
    /// use rb_install::dirs::FixedBaseDirs;
    ///
    /// let dirs = FixedBaseDirs::new("/home/ruby");
    /// let env = InstallEnv::from_lookup(&dirs, |_| None)?;
    /// assert_eq!(env.root, "/home/ruby/.rbenv");
    /// assert_eq!(env.builder, "ruby-build");
    /// # Ok::<(), rb_install::error::InstallerError>(())
    /// ```
    pub fn from_lookup<F>(dirs: &dyn BaseDirs, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let path = |key: &str| var(key).map(Utf8PathBuf::from);

        let root = match path(ROOT_VAR) {
            Some(root) => root,
            None => dirs
                .home_dir()
                .map(|home| home.join(".rbenv"))
                .ok_or(InstallerError::RootNotFound)?,
        };

        Ok(Self {
            root,
            build_path: path(BUILD_PATH_VAR),
            src_dir: path(SRC_DIR_VAR),
            cache_path: path(CACHE_PATH_VAR),
            debug: var(DEBUG_VAR).is_some(),
            log_directive: var(LOG_VAR),
            tmp_dir: path(TMPDIR_VAR).unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_TMPDIR)),
            no_color: var(NO_COLOR_VAR).is_some(),
            builder: var(BUILDER_VAR).unwrap_or_else(|| DEFAULT_BUILDER.to_owned()),
        })
    }

    /// Directory holding installed versions.
    #[must_use]
    pub fn versions_dir(&self) -> Utf8PathBuf {
        self.root.join("versions")
    }

    /// Default source directory when nothing overrides it.
    #[must_use]
    pub fn default_src_dir(&self) -> Utf8PathBuf {
        self.root.join("sources")
    }

    /// Cache directory to export, if any.
    ///
    /// An explicit `RUBY_BUILD_CACHE_PATH` is left to the inherited
    /// environment; otherwise `root/cache` is used when it exists.
    #[must_use]
    pub fn default_cache_path(&self) -> Option<Utf8PathBuf> {
        if self.cache_path.is_some() {
            return None;
        }
        let cache = self.root.join("cache");
        is_dir(&cache).then_some(cache)
    }
}

fn is_dir(path: &Utf8Path) -> bool {
    path.as_std_path().is_dir()
}
