//! Builder pattern for driver configuration.
//!
//! # Example
//!
//! ```no_run
//! use cdp_window::Driver;
//!
//! # fn example() -> cdp_window::Result<()> {
//! let driver = Driver::builder()
//!     .binary("/usr/bin/chromium")
//!     .arg("--mute-audio")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

use super::core::Driver;

// ============================================================================
// Constants
// ============================================================================

/// Default wait for the DevTools endpoint of a launched browser.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// DriverBuilder
// ============================================================================

/// Builder for configuring a [`Driver`] instance.
///
/// Use [`Driver::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct DriverBuilder {
    binary: Option<PathBuf>,
    user_data_dir: Option<PathBuf>,
    args: Vec<String>,
    launch_timeout: Duration,
}

impl Default for DriverBuilder {
    fn default() -> Self {
        Self {
            binary: None,
            user_data_dir: None,
            args: Vec::new(),
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
        }
    }
}

// ============================================================================
// DriverBuilder Implementation
// ============================================================================

impl DriverBuilder {
    /// Creates a new driver builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path to the browser executable.
    #[inline]
    #[must_use]
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Uses a persistent user data directory for every window.
    ///
    /// Without it each window gets a temporary one.
    #[inline]
    #[must_use]
    pub fn user_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_data_dir = Some(path.into());
        self
    }

    /// Adds a command-line argument passed to every launched browser.
    #[inline]
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple command-line arguments.
    #[inline]
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets how long to wait for a launched browser's DevTools endpoint.
    #[inline]
    #[must_use]
    pub fn launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }

    /// Builds the driver with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the binary is not set
    /// - [`Error::BrowserNotFound`] if the binary path doesn't exist
    /// - [`Error::Config`] if the launch timeout is zero
    pub fn build(self) -> Result<Driver> {
        let binary = self.validate_binary()?;

        if self.launch_timeout.is_zero() {
            return Err(Error::config("Launch timeout must be greater than zero"));
        }

        Ok(Driver::new(
            binary,
            self.user_data_dir,
            self.args,
            self.launch_timeout,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl DriverBuilder {
    fn validate_binary(&self) -> Result<PathBuf> {
        let binary = self.binary.clone().ok_or_else(|| {
            Error::config(
                "Browser binary path is required. Use .binary() to set it.\n\
                 Example: Driver::builder().binary(\"/usr/bin/chromium\")",
            )
        })?;

        if !binary.exists() {
            return Err(Error::browser_not_found(&binary));
        }

        Ok(binary)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = DriverBuilder::new();
        assert!(builder.binary.is_none());
        assert!(builder.user_data_dir.is_none());
        assert!(builder.args.is_empty());
        assert_eq!(builder.launch_timeout, DEFAULT_LAUNCH_TIMEOUT);
    }

    #[test]
    fn test_binary_sets_path() {
        let builder = DriverBuilder::new().binary("/usr/bin/chromium");
        assert_eq!(builder.binary, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[test]
    fn test_args_accumulate() {
        let builder = DriverBuilder::new().arg("--a").args(["--b", "--c"]);
        assert_eq!(builder.args, vec!["--a", "--b", "--c"]);
    }

    #[test]
    fn test_build_fails_without_binary() {
        let err = assert_err!(DriverBuilder::new().build());
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("binary"));
    }

    #[test]
    fn test_build_fails_with_nonexistent_binary() {
        let err = assert_err!(DriverBuilder::new().binary("/nonexistent/chromium").build());
        assert!(matches!(err, Error::BrowserNotFound { .. }));
    }

    #[test]
    fn test_build_rejects_zero_timeout() {
        let result = DriverBuilder::new()
            .binary("/bin/sh")
            .launch_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_build_succeeds_with_existing_binary() {
        let driver = assert_ok!(DriverBuilder::new().binary("/bin/sh").build());
        assert_eq!(driver.window_count(), 0);
    }
}
