//! Bridge envelope types.
//!
//! The envelope is the unit exchanged between the host half and the page
//! half of the IPC bridge. It travels as a JSON string inside protocol
//! evaluations (host → page) and binding payloads or poll results
//! (page → host).
//!
//! # Reserved Types
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | `reply` | both | Carries a listener's return value |
//! | `pong` | both | Empty acknowledgement when no listener answered |
//! | `web store write` | page → host | Page wrote to its store |
//! | `backend store write` | host → page | Host wrote to its store |
//! | `web store sync` | page → host | Page asks for the host snapshot |
//! | `exposed <key>` | both | Invokes a function exposed under `key` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::MessageId;

// ============================================================================
// Constants
// ============================================================================

/// Reply carrying a computed value.
pub const REPLY: &str = "reply";

/// Reply carrying no value.
pub const PONG: &str = "pong";

/// Store write originating in the page.
pub const WEB_STORE_WRITE: &str = "web store write";

/// Store write originating in the host.
pub const BACKEND_STORE_WRITE: &str = "backend store write";

/// Page request for the host store snapshot.
pub const WEB_STORE_SYNC: &str = "web store sync";

/// Prefix of exposed-function message types.
pub const EXPOSED_PREFIX: &str = "exposed ";

/// Returns the message type used to invoke an exposed function.
#[inline]
#[must_use]
pub fn exposed_type(key: &str) -> String {
    format!("{EXPOSED_PREFIX}{key}")
}

// ============================================================================
// Envelope
// ============================================================================

/// One bridge message.
///
/// # Format
///
/// ```json
/// { "id": "a0c1...", "type": "ping", "data": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation id; replies carry the id of the request they answer.
    #[serde(default)]
    pub id: Option<MessageId>,

    /// Type discriminator.
    #[serde(rename = "type")]
    pub kind: String,

    /// Arbitrary payload.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Creates a request envelope with a fresh id.
    #[inline]
    #[must_use]
    pub fn request(kind: impl Into<String>, data: Value) -> Self {
        Self {
            id: Some(MessageId::generate()),
            kind: kind.into(),
            data,
        }
    }

    /// Creates an envelope without id. It is dispatched but never answered.
    #[inline]
    #[must_use]
    pub fn notify(kind: impl Into<String>, data: Value) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            data,
        }
    }

    /// Creates a `reply` envelope answering `id`.
    #[inline]
    #[must_use]
    pub fn reply(id: MessageId, data: Value) -> Self {
        Self {
            id: Some(id),
            kind: REPLY.to_string(),
            data,
        }
    }

    /// Creates a `pong` envelope answering `id`.
    #[inline]
    #[must_use]
    pub fn pong(id: MessageId) -> Self {
        Self {
            id: Some(id),
            kind: PONG.to_string(),
            data: Value::Null,
        }
    }

    /// Returns `true` for `reply` and `pong` envelopes.
    #[inline]
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.kind == REPLY || self.kind == PONG
    }

    /// Returns the exposed-function key if this is an `exposed <key>` call.
    #[inline]
    #[must_use]
    pub fn exposed_key(&self) -> Option<&str> {
        self.kind.strip_prefix(EXPOSED_PREFIX)
    }
}

// ============================================================================
// StoreWrite
// ============================================================================

/// Payload of `web store write` / `backend store write`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreWrite {
    /// Written key.
    pub key: String,

    /// New value (ignored for deletes).
    #[serde(default)]
    pub value: Value,

    /// `true` when the key was removed.
    #[serde(default)]
    pub delete: bool,
}

impl StoreWrite {
    /// Creates a set payload.
    #[inline]
    #[must_use]
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            delete: false,
        }
    }

    /// Creates a delete payload.
    #[inline]
    #[must_use]
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Value::Null,
            delete: true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
