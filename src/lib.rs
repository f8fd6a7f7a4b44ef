//! CDP Window - drive a browser page as an application window.
//!
//! This library attaches to a Chromium-family browser over the DevTools
//! protocol and turns one page into an application window with a
//! bidirectional message bridge between the host and the page.
//!
//! # Architecture
//!
//! - **Host (Rust)**: owns the debugging session, the host half of the
//!   bridge and the window lifecycle
//! - **Page (JavaScript)**: a generated bootstrap installed on every
//!   document as `window.CdpWindow`
//!
//! Key design principles:
//!
//! - Each [`Window`] owns: one session + one bridge + optionally one process
//! - Bridge messages are `{ id?, type, data }` envelopes, correlated by id
//! - Page → host delivery uses a `Runtime.addBinding` push channel, with a
//!   long-poll fallback
//! - Navigations away from the application page are blocked or reverted
//!
//! # Quick Start
//!
//! ```no_run
//! use cdp_window::{Driver, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let driver = Driver::builder()
//!         .binary("/usr/bin/chromium")
//!         .build()?;
//!
//!     let window = driver.window()
//!         .url("https://example.com")
//!         .size(1280, 800)
//!         .spawn()
//!         .await?;
//!
//!     // Callable from the page as `await CdpWindow.ipc.call("add", [2, 3])`
//!     window.ipc().expose("add", |args| async move {
//!         serde_json::json!(args.iter().filter_map(|v| v.as_i64()).sum::<i64>())
//!     })?;
//!
//!     window.ipc().store().set("theme", "dark")?;
//!
//!     window.wait().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`browser`] | [`Window`] and its sub-APIs |
//! | [`driver`] | Browser launch and window factory |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`ipc`] | Message bridge, mirrored store and delivery pump |
//! | [`protocol`] | Wire and envelope types |
//! | [`session`] | Session controller, navigation guard, script injector |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Window and its sub-APIs.
pub mod browser;

/// Browser launch and window factory.
///
/// Use [`Driver::builder()`] to create a configured driver instance.
pub mod driver;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Host half of the message bridge.
pub mod ipc;

/// DevTools wire types and bridge envelopes.
pub mod protocol;

/// Session control.
pub mod session;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Browser types
pub use browser::{
    Controls, Idle, Page, ResourceInfo, Resources, ScriptCache, Versions, Window, WindowBounds,
    WindowBuilder, WindowOptions,
};

// Driver types
pub use driver::{BrowserOptions, Driver, DriverBuilder, Profile};

// Bridge types
pub use ipc::{DeliveryMode, Ipc, Store};

// Session types
pub use session::{NavigationPolicy, Session, TargetFilter};

// Transport types
pub use transport::{Connection, ProtocolTransport};

// Protocol types
pub use protocol::Envelope;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ListenerId, MessageId, SessionId, TargetId};
