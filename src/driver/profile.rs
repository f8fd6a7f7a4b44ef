//! Browser user data directories.
//!
//! Temporary directories are removed when the [`Profile`] is dropped;
//! persistent ones are left in place.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Profile
// ============================================================================

/// A browser user data directory.
pub struct Profile {
    /// Keeps a temporary directory alive.
    _temp_dir: Option<TempDir>,

    path: PathBuf,
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("path", &self.path)
            .field("temporary", &self.is_temporary())
            .finish()
    }
}

impl Profile {
    /// Creates a temporary profile, deleted on drop.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new_temp() -> Result<Self> {
        let temp_dir = TempDir::with_prefix("cdp-window-")
            .map_err(|e| Error::config(format!("Failed to create temp profile: {e}")))?;

        let path = temp_dir.path().to_path_buf();
        debug!(path = %path.display(), "Created temporary profile");

        Ok(Self {
            _temp_dir: Some(temp_dir),
            path,
        })
    }

    /// Uses a persistent directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if path.exists() {
            debug!(path = %path.display(), "Using existing profile directory");
        } else {
            fs::create_dir_all(&path).map_err(|e| {
                Error::config(format!(
                    "Failed to create profile directory at {}: {e}",
                    path.display()
                ))
            })?;
            debug!(path = %path.display(), "Created profile directory");
        }

        Ok(Self {
            _temp_dir: None,
            path,
        })
    }

    /// Returns the directory path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the directory is removed on drop.
    #[inline]
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self._temp_dir.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
