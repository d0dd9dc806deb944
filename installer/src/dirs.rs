//! Directory resolution abstraction for platform-specific paths.
//!
//! Production code uses [`SystemBaseDirs`], backed by `directories-next`.
//! Tests substitute a fixed home directory.

use camino::Utf8PathBuf;

/// Source of the user's base directories.
pub trait BaseDirs {
    /// The user's home directory, when it exists and is valid UTF-8.
    fn home_dir(&self) -> Option<Utf8PathBuf>;
}

/// Base directories of the current user.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<Utf8PathBuf> {
        directories_next::BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::try_from(dirs.home_dir().to_path_buf()).ok())
    }
}

/// Base directories rooted at a fixed path.
#[derive(Debug, Clone, Default)]
pub struct FixedBaseDirs {
    home: Option<Utf8PathBuf>,
}

impl FixedBaseDirs {
    /// Uses `home` as the home directory.
    #[must_use]
    pub fn new(home: impl Into<Utf8PathBuf>) -> Self {
        Self {
            home: Some(home.into()),
        }
    }

    /// Reports no home directory at all.
    #[must_use]
    pub const fn homeless() -> Self {
        Self { home: None }
    }
}

impl BaseDirs for FixedBaseDirs {
    fn home_dir(&self) -> Option<Utf8PathBuf> {
        self.home.clone()
    }
}
