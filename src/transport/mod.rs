//! Debugging-protocol transport layer.
//!
//! This module defines the seam between the window logic and the wire: the
//! [`ProtocolTransport`] trait. Everything above it (session controller,
//! navigation guard, script injector, IPC pump) only ever sends
//! `Domain.method` commands and listens to events through this trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Window (Rust)  │                              │  Browser        │
//! │                 │         WebSocket            │                 │
//! │  Connection     │◄────────────────────────────►│  DevTools       │
//! │  (event loop)   │   ws://127.0.0.1:PORT/...    │  endpoint       │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and event loop |
//! | `handlers` | Message handler registry shared by transports |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::error::Result;
use crate::identifiers::{HandlerId, SessionId};
use crate::protocol::ProtocolEvent;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// Message handler registry.
pub mod handlers;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::Connection;
pub use handlers::HandlerRegistry;

// ============================================================================
// Types
// ============================================================================

/// Message handler callback type.
///
/// Called on the transport's event loop for every event. Handlers must not
/// block; forward to a channel and do the work elsewhere.
pub type MessageHandler = Arc<dyn Fn(&ProtocolEvent) + Send + Sync>;

// ============================================================================
// ProtocolTransport
// ============================================================================

/// Duplex debugging-protocol channel.
///
/// Commands are correlated to their responses by the transport itself;
/// callers only see the result value.
#[async_trait]
pub trait ProtocolTransport: Send + Sync + 'static {
    /// Sends a command and waits for its result.
    ///
    /// `session_id` routes the command to an attached target session;
    /// `None` addresses the browser itself.
    async fn send(&self, method: &str, params: Value, session_id: Option<&SessionId>)
    -> Result<Value>;

    /// Registers a handler for every incoming event.
    fn on_message(&self, handler: MessageHandler) -> HandlerId;

    /// Removes a handler. Returns `false` if it was not registered.
    fn off_message(&self, id: HandlerId) -> bool;

    /// Closes the channel. In-flight commands fail with
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed).
    fn close(&self);

    /// Watch that flips to `true` once the channel is gone.
    fn closed(&self) -> watch::Receiver<bool>;

    /// Registers a handler that forwards every event into a channel.
    fn subscribe(&self) -> (HandlerId, mpsc::UnboundedReceiver<ProtocolEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.on_message(Arc::new(move |event: &ProtocolEvent| {
            let _ = tx.send(event.clone());
        }));
        (id, rx)
    }
}
