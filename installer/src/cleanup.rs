//! Removal of a partially created installation prefix.
//!
//! Whether the prefix existed is captured before `ruby-build` runs. A prefix
//! that existed beforehand is never removed, even when a forced reinstall
//! into it fails.

use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};

/// The installation prefix and whether it existed before the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixState {
    path: Utf8PathBuf,
    existed: bool,
}

impl PrefixState {
    /// Records whether `path` exists right now.
    #[must_use]
    pub fn capture(path: impl Into<Utf8PathBuf>) -> Self {
        let path = path.into();
        let existed = path.as_std_path().exists();
        Self { path, existed }
    }

    /// The prefix directory.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Whether the prefix existed when captured.
    #[must_use]
    pub const fn existed(&self) -> bool {
        self.existed
    }

    /// Whether `prefix/bin` exists, i.e. the version looks installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.path.join("bin").as_std_path().is_dir()
    }

    /// Removes the prefix tree unless it existed before the run.
    ///
    /// Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if removal fails for any reason other than the
    /// prefix already being gone.
    pub fn cleanup(&self) -> Result<bool> {
        if self.existed {
            debug!("keeping pre-existing prefix {}", self.path);
            return Ok(false);
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {
                debug!("removed partial prefix {}", self.path);
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Cleans up the prefix on drop unless disarmed.
///
/// Armed right before `ruby-build` runs, so any early return between then and
/// a successful finish removes the partial installation.
#[derive(Debug)]
pub struct CleanupGuard {
    state: Option<PrefixState>,
}

impl CleanupGuard {
    /// Arms cleanup for `state`.
    #[must_use]
    pub const fn arm(state: PrefixState) -> Self {
        Self { state: Some(state) }
    }

    /// Keeps the prefix.
    pub fn disarm(mut self) {
        self.state = None;
    }

    /// Runs cleanup now and disarms.
    ///
    /// # Errors
    ///
    /// See [`PrefixState::cleanup`].
    pub fn cleanup(mut self) -> Result<bool> {
        self.state.take().map_or(Ok(false), |state| state.cleanup())
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            if let Err(err) = state.cleanup() {
                warn!("could not remove {}: {err}", state.path());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Root {
        _temp: TempDir,
        prefix: Utf8PathBuf,
    }

    #[fixture]
    fn root() -> Root {
        let temp = tempfile::tempdir().expect("temp dir");
        let base = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("utf8 path");
        Root {
            _temp: temp,
            prefix: base.join("versions").join("3.2.0"),
        }
    }

    fn populate(prefix: &Utf8Path) {
        std::fs::create_dir_all(prefix.join("bin")).expect("create bin");
        std::fs::write(prefix.join("bin").join("ruby"), "").expect("write ruby");
    }

    #[rstest]
    fn new_prefix_is_removed(root: Root) {
        let state = PrefixState::capture(&root.prefix);
        assert!(!state.existed());
        populate(&root.prefix);

        assert!(state.cleanup().expect("cleanup"));
        assert!(!root.prefix.exists());
    }

    #[rstest]
    fn pre_existing_prefix_is_kept(root: Root) {
        populate(&root.prefix);
        let state = PrefixState::capture(&root.prefix);
        assert!(state.existed());
        assert!(state.is_installed());

        assert!(!state.cleanup().expect("cleanup"));
        assert!(root.prefix.join("bin").join("ruby").exists());
    }

    #[rstest]
    fn missing_prefix_cleans_up_quietly(root: Root) {
        let state = PrefixState::capture(&root.prefix);
        assert!(!state.cleanup().expect("cleanup"));
    }

    #[rstest]
    fn dropped_guard_removes_new_prefix(root: Root) {
        let guard = CleanupGuard::arm(PrefixState::capture(&root.prefix));
        populate(&root.prefix);
        drop(guard);
        assert!(!root.prefix.exists());
    }

    #[rstest]
    fn disarmed_guard_keeps_prefix(root: Root) {
        let guard = CleanupGuard::arm(PrefixState::capture(&root.prefix));
        populate(&root.prefix);
        guard.disarm();
        assert!(root.prefix.join("bin").exists());
    }
}
