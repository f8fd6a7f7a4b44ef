//! Host half of the mirrored key-value store.
//!
//! Host writes are applied locally and forwarded to the page as
//! `backend store write` notifications. Page writes arrive as
//! `web store write` and are applied without echo.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::protocol::envelope::BACKEND_STORE_WRITE;
use crate::protocol::{Envelope, StoreWrite};

/// Bridge method names that can never be used as store keys.
pub const RESERVED_KEYS: &[&str] = &[
    "send",
    "on",
    "removeListener",
    "expose",
    "unexpose",
    "call",
    "store",
    "_receive",
    "_get",
    "_send",
];

/// Returns `true` if `key` collides with a bridge method.
#[inline]
#[must_use]
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

struct StoreInner {
    values: Mutex<Map<String, Value>>,
    outbound: mpsc::UnboundedSender<Envelope>,
}

/// Mirrored store handle. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl Store {
    pub(crate) fn new(outbound: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                values: Mutex::new(Map::new()),
                outbound,
            }),
        }
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.values.lock().get(key).cloned()
    }

    /// Stores `value` under `key` and forwards the write to the page.
    ///
    /// The write is fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedKey`] if `key` is a bridge method name.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        if is_reserved(key) {
            return Err(Error::reserved_key(key));
        }

        let value = value.into();
        self.inner
            .values
            .lock()
            .insert(key.to_string(), value.clone());
        self.forward(StoreWrite::set(key, value));
        Ok(())
    }

    /// Removes `key` and forwards the delete to the page.
    ///
    /// Returns `false` if the key was absent; the delete is forwarded
    /// either way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedKey`] if `key` is a bridge method name.
    pub fn delete(&self, key: &str) -> Result<bool> {
        if is_reserved(key) {
            return Err(Error::reserved_key(key));
        }

        let existed = self.inner.values.lock().remove(key).is_some();
        self.forward(StoreWrite::delete(key));
        Ok(existed)
    }

    /// Returns the keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.values.lock().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.values.lock().contains_key(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.values.lock().len()
    }

    /// Returns `true` if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.values.lock().is_empty()
    }

    /// Returns a snapshot as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.inner.values.lock().clone())
    }

    /// Applies a write that originated in the page.
    pub(crate) fn apply_remote(&self, write: StoreWrite) {
        if is_reserved(&write.key) {
            warn!(key = %write.key, "Ignoring page write to reserved store key");
            return;
        }

        trace!(key = %write.key, delete = write.delete, "Applying page store write");
        let mut values = self.inner.values.lock();
        if write.delete {
            values.remove(&write.key);
        } else {
            values.insert(write.key, write.value);
        }
    }

    fn forward(&self, write: StoreWrite) {
        let data = match serde_json::to_value(&write) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Failed to encode store write");
                return;
            }
        };

        if self
            .inner
            .outbound
            .send(Envelope::notify(BACKEND_STORE_WRITE, data))
            .is_err()
        {
            trace!(key = %write.key, "Store write not forwarded, bridge closed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
