//! Ordered registry of message handlers.

use parking_lot::Mutex;

use crate::identifiers::HandlerId;
use crate::protocol::ProtocolEvent;

use super::MessageHandler;

/// Ordered list of message handlers with unhook support.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Mutex<Vec<(HandlerId, MessageHandler)>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler.
    pub fn add(&self, handler: MessageHandler) -> HandlerId {
        let id = HandlerId::next();
        self.handlers.lock().push((id, handler));
        id
    }

    /// Removes a handler by id.
    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    /// Invokes every handler in registration order.
    ///
    /// The lock is released before handlers run, so a handler may unhook
    /// itself.
    pub fn dispatch(&self, event: &ProtocolEvent) {
        let snapshot: Vec<MessageHandler> = self
            .handlers
            .lock()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in snapshot {
            handler(event);
        }
    }

    /// Returns the number of registered handlers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Returns `true` if no handler is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    #[test]
    fn test_dispatch_and_remove() {
        let registry = HandlerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let id = registry.add(Arc::new(move |_event: &ProtocolEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let event = ProtocolEvent::new("Page.loadEventFired", json!({}), None);
        registry.dispatch(&event);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        registry.dispatch(&event);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }
}
