//! Browser window and its sub-APIs.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Window`] | Application window (session + bridge + optional process) |
//! | [`Page`] | Title, URL, evaluation, reload, PDF |
//! | [`Controls`] | Minimize, maximize, fullscreen, resize |
//! | [`Idle`] | Page freezing |
//! | [`Resources`] | Frame tree resources |
//! | [`ScriptCache`] | Persistent compilation cache |
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
//! let window = driver.window().url("https://example.com").spawn().await?;
//! let title = window.page().title().await?;
//! window.controls().maximize().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Persistent compilation cache.
pub mod cache;

/// Native window controls.
pub mod controls;

/// Page lifecycle freezing.
pub mod idle;

/// Page-level helpers.
pub mod page;

/// Owned browser process.
pub mod process;

/// Resource enumeration.
pub mod resources;

/// Shutdown triggers and signal handling.
pub mod shutdown;

/// Browser version metadata.
pub mod versions;

/// Window lifecycle.
pub mod window;

// ============================================================================
// Re-exports
// ============================================================================

pub use cache::ScriptCache;
pub use controls::{Controls, WindowBounds};
pub use idle::Idle;
pub use page::Page;
pub use process::ProcessGuard;
pub use resources::{ResourceInfo, Resources};
pub use shutdown::{CloseGate, ShutdownTrigger, SignalKind};
pub use versions::Versions;
pub use window::{Window, WindowBuilder, WindowOptions};
