//! Browser launching and window factory.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Driver`] | Launches browsers and tracks their windows |
//! | [`DriverBuilder`] | Fluent configuration builder |
//! | [`BrowserOptions`] | Browser command-line options |
//! | [`Profile`] | User data directory |
//!
//! # Example
//!
//! ```no_run
//! use cdp_window::{Driver, Result};
//!
//! # async fn example() -> Result<()> {
//! let driver = Driver::builder()
//!     .binary("/usr/bin/chromium")
//!     .build()?;
//!
//! let window = driver.window().headless().url("https://example.com").spawn().await?;
//! window.wait().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for driver configuration.
pub mod builder;

/// Core driver implementation.
pub mod core;

/// Process launch and endpoint discovery.
mod launch;

/// Browser command-line options.
pub mod options;

/// User data directories.
pub mod profile;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{DEFAULT_LAUNCH_TIMEOUT, DriverBuilder};
pub use core::Driver;
pub use options::BrowserOptions;
pub use profile::Profile;
