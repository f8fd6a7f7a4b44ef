//! Event message types.
//!
//! Events are unsolicited notifications from the browser. They arrive on
//! the same connection as command responses and are fanned out to every
//! registered message handler.
//!
//! # Events Used
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Page` | `frameScheduledNavigation`, `frameNavigated`, `compilationCacheProduced` |
//! | `Runtime` | `executionContextCreated`, `bindingCalled` |
//! | `Target` | `targetDestroyed`, `detachedFromTarget` |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::identifiers::{SessionId, TargetId};

// ============================================================================
// ProtocolEvent
// ============================================================================

/// An event notification from the browser.
#[derive(Debug, Clone)]
pub struct ProtocolEvent {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    pub params: Value,

    /// Session the event was raised on, absent for browser-level events.
    pub session_id: Option<SessionId>,
}

impl ProtocolEvent {
    /// Creates an event (mostly useful in tests).
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value, session_id: Option<SessionId>) -> Self {
        Self {
            method: method.into(),
            params,
            session_id,
        }
    }

    /// Returns the domain name from the method.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let event = ProtocolEvent::new("Page.frameNavigated", json!({}), None);
    /// assert_eq!(event.domain(), "Page");
    /// ```
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name from the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split('.').nth(1).unwrap_or_default()
    }

    /// Returns `true` if the event belongs to the given session.
    #[inline]
    #[must_use]
    pub fn is_for(&self, session_id: &SessionId) -> bool {
        self.session_id.as_ref() == Some(session_id)
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        self.parse_internal()
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// A frame is about to navigate (pre-commit).
    FrameScheduledNavigation {
        /// Frame ID.
        frame_id: String,
        /// Destination URL.
        url: String,
    },

    /// A frame committed a navigation (post-hoc).
    FrameNavigated {
        /// Frame ID.
        frame_id: String,
        /// Parent frame ID, `None` for the main frame.
        parent_id: Option<String>,
        /// Committed URL.
        url: String,
    },

    /// A new JavaScript execution context exists.
    ExecutionContextCreated {
        /// Context ID.
        context_id: i64,
        /// Frame the context belongs to, if reported.
        frame_id: Option<String>,
    },

    /// Page script called a binding installed with `Runtime.addBinding`.
    BindingCalled {
        /// Binding name.
        name: String,
        /// String payload passed by the page.
        payload: String,
    },

    /// The browser produced a V8 code cache entry.
    CompilationCacheProduced {
        /// Script URL.
        url: String,
        /// Base64 encoded cache data.
        data: String,
    },

    /// A target went away.
    TargetDestroyed {
        /// Target ID.
        target_id: TargetId,
    },

    /// A session was detached from its target.
    DetachedFromTarget {
        /// Detached session ID.
        session_id: SessionId,
    },

    /// Unknown event type.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Event Parsing Implementation
// ============================================================================

impl ProtocolEvent {
    /// Internal parsing implementation.
    fn parse_internal(&self) -> ParsedEvent {
        match self.method.as_str() {
            "Page.frameScheduledNavigation" => ParsedEvent::FrameScheduledNavigation {
                frame_id: self.get_string("frameId"),
                url: self.get_string("url"),
            },

            "Page.frameNavigated" => {
                let frame = self.params.get("frame").unwrap_or(&Value::Null);
                ParsedEvent::FrameNavigated {
                    frame_id: str_field(frame, "id"),
                    parent_id: frame
                        .get("parentId")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    url: str_field(frame, "url"),
                }
            }

            "Runtime.executionContextCreated" => {
                let context = self.params.get("context").unwrap_or(&Value::Null);
                ParsedEvent::ExecutionContextCreated {
                    context_id: context.get("id").and_then(Value::as_i64).unwrap_or_default(),
                    frame_id: context
                        .get("auxData")
                        .and_then(|aux| aux.get("frameId"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                }
            }

            "Runtime.bindingCalled" => ParsedEvent::BindingCalled {
                name: self.get_string("name"),
                payload: self.get_string("payload"),
            },

            "Page.compilationCacheProduced" => ParsedEvent::CompilationCacheProduced {
                url: self.get_string("url"),
                data: self.get_string("data"),
            },

            "Target.targetDestroyed" => ParsedEvent::TargetDestroyed {
                target_id: TargetId::new(self.get_string("targetId")),
            },

            "Target.detachedFromTarget" => ParsedEvent::DetachedFromTarget {
                session_id: SessionId::new(self.get_string("sessionId")),
            },

            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        }
    }

    /// Gets a string from params.
    #[inline]
    fn get_string(&self, key: &str) -> String {
        str_field(&self.params, key)
    }
}

/// Gets a string field from a JSON object, empty when missing.
#[inline]
fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================
