//! Wire message types.
//!
//! This module defines the frames exchanged with the browser's DevTools
//! endpoint and the envelopes exchanged by the two halves of the IPC bridge.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `CdpRequest` | Host → Browser | Command request |
//! | `CdpMessage` | Browser → Host | Command response or event |
//! | `ProtocolEvent` | Browser → Host | Unsolicited notification |
//! | `Envelope` | Host ↔ Page | Bridge message |
//!
//! # Command Naming
//!
//! Commands follow `Domain.method` format:
//!
//! - `Target.attachToTarget`
//! - `Runtime.evaluate`
//! - `Page.stopLoading`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Bridge envelope and store payloads |
//! | `event` | Event and ParsedEvent types |
//! | `request` | Request and incoming frame types |
//! | `types` | Typed command results |

// ============================================================================
// Submodules
// ============================================================================

/// Bridge envelope types.
pub mod envelope;

/// Event message types.
pub mod event;

/// Request and incoming frame types.
pub mod request;

/// Typed command results.
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{Envelope, StoreWrite};
pub use event::{ParsedEvent, ProtocolEvent};
pub use request::{CdpErrorBody, CdpMessage, CdpRequest};
pub use types::{
    BrowserVersion, FrameDescriptor, FrameResource, FrameResourceTree, NavigationEntry,
    NavigationHistory, TargetInfo,
};
