//! Bidirectional message bridge between host and page.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐    _receive(envelope)     ┌──────────────────────┐
//! │  Ipc (Rust)          │ ────────────────────────► │  CdpWindow.ipc (JS)  │
//! │  pending / listeners │                           │  pending / listeners │
//! │  Store               │ ◄──────────────────────── │  store               │
//! └──────────────────────┘  binding push or _get()   └──────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bridge` | Host half: requests, listeners, exposed functions |
//! | `listeners` | Ordered listener table |
//! | `store` | Host half of the mirrored store |
//! | `bootstrap` | Page half, rendered as JavaScript |
//! | `pump` | Delivery tasks in both directions |

/// Page half of the bridge.
pub mod bootstrap;

/// Host half of the bridge.
pub mod bridge;

/// Ordered listener table.
pub mod listeners;

/// Delivery tasks.
pub mod pump;

/// Mirrored key-value store.
pub mod store;

pub use bridge::{ExposedFn, Ipc, exposed};
pub use listeners::{Listener, ListenerTable, listener};
pub use pump::{DeliveryMode, DeliveryPump, spawn_writer};
pub use store::{RESERVED_KEYS, Store, is_reserved};
