//! Command request and incoming message types.
//!
//! Defines the JSON frames exchanged with the browser's DevTools endpoint.
//! Every frame from the browser is either a command response (carries `id`)
//! or an event (carries `method`).

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

use super::ProtocolEvent;

// ============================================================================
// CdpRequest
// ============================================================================

/// A command request from the host to the browser.
///
/// # Format
///
/// ```json
/// {
///   "id": 7,
///   "method": "Runtime.evaluate",
///   "params": { ... },
///   "sessionId": "8A3F..."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct CdpRequest {
    /// Connection-local id for response correlation.
    pub id: u64,

    /// Method in `Domain.method` format.
    pub method: String,

    /// Command parameters.
    pub params: Value,

    /// Target session, absent for browser-level commands.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl CdpRequest {
    /// Creates a new request.
    #[inline]
    #[must_use]
    pub fn new(
        id: u64,
        method: impl Into<String>,
        params: Value,
        session_id: Option<SessionId>,
    ) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            session_id,
        }
    }
}

// ============================================================================
// CdpMessage
// ============================================================================

/// Any frame received from the browser.
///
/// # Format
///
/// Response:
/// ```json
/// { "id": 7, "result": { ... } }
/// { "id": 7, "error": { "code": -32000, "message": "..." } }
/// ```
///
/// Event:
/// ```json
/// { "method": "Page.frameNavigated", "params": { ... }, "sessionId": "..." }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CdpMessage {
    /// Correlation id (responses only).
    #[serde(default)]
    pub id: Option<u64>,

    /// Result payload (success responses).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error payload (error responses).
    #[serde(default)]
    pub error: Option<CdpErrorBody>,

    /// Event name (events only).
    #[serde(default)]
    pub method: Option<String>,

    /// Event parameters (events only).
    #[serde(default)]
    pub params: Option<Value>,

    /// Session the frame belongs to.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

/// Error object inside a response.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpErrorBody {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

impl CdpMessage {
    /// Returns `true` if this frame answers a command.
    #[inline]
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.id.is_some()
    }

    /// Extracts the result, turning an error body into [`Error::Cdp`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cdp`] if the browser rejected the command.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::cdp(error.code, error.message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }

    /// Converts the frame into an event, if it is one.
    #[must_use]
    pub fn into_event(self) -> Option<ProtocolEvent> {
        let method = self.method?;
        Some(ProtocolEvent {
            method,
            params: self.params.unwrap_or(Value::Null),
            session_id: self.session_id,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = CdpRequest::new(
            3,
            "Runtime.evaluate",
            json!({ "expression": "1 + 1" }),
            Some(SessionId::new("S1")),
        );
        let json = serde_json::to_value(&request).expect("serialize");

        assert_eq!(json["id"], 3);
        assert_eq!(json["method"], "Runtime.evaluate");
        assert_eq!(json["sessionId"], "S1");
    }

    #[test]
    fn test_browser_level_request_omits_session() {
        let request = CdpRequest::new(1, "Target.getTargets", json!({}), None);
        let json = serde_json::to_string(&request).expect("serialize");
        assert!(!json.contains("sessionId"));
    }

    #[test]
    fn test_success_response() {
        let message: CdpMessage =
            serde_json::from_str(r#"{"id": 4, "result": {"sessionId": "S1"}}"#).expect("parse");
        assert!(message.is_response());

        let result = message.into_result().expect("success");
        assert_eq!(result["sessionId"], "S1");
    }

    #[test]
    fn test_error_response() {
        let message: CdpMessage = serde_json::from_str(
            r#"{"id": 5, "error": {"code": -32601, "message": "'Foo.bar' wasn't found"}}"#,
        )
        .expect("parse");

        match message.into_result() {
            Err(Error::Cdp { code, message }) => {
                assert_eq!(code, -32601);
                assert!(message.contains("Foo.bar"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_event_frame() {
        let message: CdpMessage = serde_json::from_str(
            r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.5}, "sessionId": "S9"}"#,
        )
        .expect("parse");
        assert!(!message.is_response());

        let event = message.into_event().expect("event");
        assert_eq!(event.method, "Page.loadEventFired");
        assert_eq!(event.session_id, Some(SessionId::new("S9")));
    }
}
