//! Listener table keyed by envelope type.

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::identifiers::ListenerId;

/// Async listener. Returning `None` means the listener produced no reply.
pub type Listener = Arc<dyn Fn(Value) -> BoxFuture<'static, Option<Value>> + Send + Sync>;

/// Boxes an async closure into a [`Listener`].
pub fn listener<F, Fut>(handler: F) -> Listener
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<Value>> + Send + 'static,
{
    Arc::new(move |data: Value| handler(data).boxed())
}

/// Ordered listeners per envelope type.
///
/// Insertion order is invocation order.
#[derive(Default)]
pub struct ListenerTable {
    entries: Mutex<FxHashMap<String, Vec<(ListenerId, Listener)>>>,
}

impl ListenerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener for `kind`.
    pub fn add(&self, kind: &str, listener: Listener) -> ListenerId {
        let id = ListenerId::next();
        self.entries
            .lock()
            .entry(kind.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    /// Replaces every listener for `kind` with `listener`.
    pub fn replace(&self, kind: &str, listener: Listener) -> ListenerId {
        let id = ListenerId::next();
        self.entries
            .lock()
            .insert(kind.to_string(), vec![(id, listener)]);
        id
    }

    /// Removes one listener.
    pub fn remove(&self, kind: &str, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let Some(list) = entries.get_mut(kind) else {
            return false;
        };

        let before = list.len();
        list.retain(|(listener_id, _)| *listener_id != id);
        let removed = list.len() != before;

        if list.is_empty() {
            entries.remove(kind);
        }
        removed
    }

    /// Removes every listener for `kind`.
    pub fn clear(&self, kind: &str) -> bool {
        self.entries.lock().remove(kind).is_some()
    }

    /// Returns the number of listeners for `kind`.
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.entries.lock().get(kind).map_or(0, Vec::len)
    }

    /// Invokes every listener for `kind` in order, awaiting each.
    ///
    /// Returns the first `Some` produced. The lock is not held while
    /// listeners run, so a listener may add or remove listeners.
    pub async fn dispatch(&self, kind: &str, data: Value) -> Option<Value> {
        let snapshot: Vec<Listener> = self
            .entries
            .lock()
            .get(kind)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        let mut reply = None;
        for listener in snapshot {
            let value = listener(data.clone()).await;
            if reply.is_none() {
                reply = value;
            }
        }
        reply
    }
}

// ============================================================================
// Tests
// ============================================================================
