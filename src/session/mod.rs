//! Session control.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `controller` | Target acquisition, attachment and commands |
//! | `navigation` | Navigation policy and guard |
//! | `injector` | Bootstrap script injection |

/// Target acquisition and session attachment.
pub mod controller;

/// Bootstrap script injection.
pub mod injector;

/// Navigation policy and guard.
pub mod navigation;

pub use controller::{Session, SessionEvents, TARGET_POLL_INTERVAL, TargetFilter};
pub use injector::Injection;
pub use navigation::{NavigationGuard, NavigationOutcome, NavigationPolicy};
