//! Target acquisition and session attachment.
//!
//! A [`Session`] is one flattened debugging session attached to one page
//! target. It is created once per window and never reattached.
//!
//! # Establishment
//!
//! 1. Poll `Target.getTargets` until a target passes the [`TargetFilter`]
//! 2. `Target.attachToTarget` with `flatten: true`
//! 3. Enable the `Runtime` and `Page` domains on the new session

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::identifiers::{HandlerId, SessionId, TargetId};
use crate::protocol::{ProtocolEvent, TargetInfo};
use crate::transport::ProtocolTransport;

// ============================================================================
// Constants
// ============================================================================

/// Interval between two `Target.getTargets` polls.
pub const TARGET_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Domains enabled on every session.
const REQUIRED_DOMAINS: &[&str] = &["Runtime", "Page"];

// ============================================================================
// TargetFilter
// ============================================================================

/// Predicate deciding which target a window attaches to.
#[derive(Clone, Default)]
pub enum TargetFilter {
    /// Any page target.
    #[default]
    AnyPage,

    /// A page target that has left the browser's initial blank page.
    StartupPage,

    /// Caller-supplied predicate.
    Custom(Arc<dyn Fn(&TargetInfo) -> bool + Send + Sync>),
}

impl TargetFilter {
    /// Builds a custom filter.
    #[must_use]
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&TargetInfo) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(predicate))
    }

    /// Returns `true` if the target is acceptable.
    #[must_use]
    pub fn matches(&self, target: &TargetInfo) -> bool {
        match self {
            Self::AnyPage => target.is_page(),
            Self::StartupPage => target.is_page() && target.url != "about:blank",
            Self::Custom(predicate) => predicate(target),
        }
    }
}

impl fmt::Debug for TargetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyPage => f.write_str("AnyPage"),
            Self::StartupPage => f.write_str("StartupPage"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Internal shared state for a session.
struct SessionInner {
    transport: Arc<dyn ProtocolTransport>,
    target_id: TargetId,
    session_id: SessionId,
    target_url: String,
    enabled_domains: Mutex<FxHashSet<String>>,
}

/// A debugging session attached to one page target.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("target_id", &self.inner.target_id)
            .field("session_id", &self.inner.session_id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Establishment
// ============================================================================

impl Session {
    /// Acquires a target, attaches to it and enables the required domains.
    ///
    /// Target acquisition polls until a match appears; there is no timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if a protocol command fails.
    pub async fn establish(
        transport: Arc<dyn ProtocolTransport>,
        filter: &TargetFilter,
    ) -> Result<Self> {
        let target = Self::acquire_target(transport.as_ref(), filter).await?;
        debug!(target_id = %target.target_id, url = %target.url, "Target acquired");

        let attached = transport
            .send(
                "Target.attachToTarget",
                json!({ "targetId": target.target_id, "flatten": true }),
                None,
            )
            .await?;

        let session_id = attached
            .get("sessionId")
            .and_then(Value::as_str)
            .map(SessionId::new)
            .ok_or_else(|| Error::protocol("Expected sessionId in attachToTarget response"))?;

        let session = Self {
            inner: Arc::new(SessionInner {
                transport,
                target_id: target.target_id,
                session_id,
                target_url: target.url,
                enabled_domains: Mutex::new(FxHashSet::default()),
            }),
        };

        for domain in REQUIRED_DOMAINS {
            session.enable(domain).await?;
        }

        info!(
            target_id = %session.inner.target_id,
            session_id = %session.inner.session_id,
            "Session established"
        );

        Ok(session)
    }

    /// Polls the target list until one matches.
    async fn acquire_target(
        transport: &dyn ProtocolTransport,
        filter: &TargetFilter,
    ) -> Result<TargetInfo> {
        loop {
            let result = transport.send("Target.getTargets", json!({}), None).await?;
            let targets: Vec<TargetInfo> = serde_json::from_value(
                result.get("targetInfos").cloned().unwrap_or(Value::Null),
            )?;

            if let Some(target) = targets.into_iter().find(|t| filter.matches(t)) {
                return Ok(target);
            }

            trace!("No matching target yet");
            tokio::time::sleep(TARGET_POLL_INTERVAL).await;
        }
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns the attached target id.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        &self.inner.target_id
    }

    /// Returns the session id.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.inner.session_id
    }

    /// Returns the URL the target had when it was acquired.
    #[inline]
    #[must_use]
    pub fn target_url(&self) -> &str {
        &self.inner.target_url
    }

    /// Returns the underlying transport.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn ProtocolTransport> {
        &self.inner.transport
    }

    /// Returns `true` if the domain was enabled on this session.
    #[must_use]
    pub fn is_enabled(&self, domain: &str) -> bool {
        self.inner.enabled_domains.lock().contains(domain)
    }

    /// Returns the enabled domains, sorted.
    #[must_use]
    pub fn enabled_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.inner.enabled_domains.lock().iter().cloned().collect();
        domains.sort();
        domains
    }
}

// ============================================================================
// Session - Commands
// ============================================================================

impl Session {
    /// Sends a command on this session.
    ///
    /// # Errors
    ///
    /// Returns the transport or protocol error.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        self.inner
            .transport
            .send(method, params, Some(&self.inner.session_id))
            .await
    }

    /// Enables a protocol domain (`<Domain>.enable`) once.
    ///
    /// # Errors
    ///
    /// Returns the protocol error if the domain cannot be enabled.
    pub async fn enable(&self, domain: &str) -> Result<()> {
        if self.is_enabled(domain) {
            return Ok(());
        }

        self.send(&format!("{domain}.enable"), json!({})).await?;
        self.inner.enabled_domains.lock().insert(domain.to_string());
        debug!(session_id = %self.inner.session_id, domain, "Domain enabled");
        Ok(())
    }

    /// Evaluates an expression in the page's main world.
    ///
    /// Promises are awaited and the result is returned by value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Script`] if the expression threw.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        self.evaluate_in(expression, None).await
    }

    /// Evaluates an expression, optionally in a specific execution context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Script`] if the expression threw.
    pub async fn evaluate_in(&self, expression: &str, context_id: Option<i64>) -> Result<Value> {
        let mut params = json!({
            "expression": expression,
            "returnByValue": true,
            "awaitPromise": true,
        });
        if let Some(context_id) = context_id {
            params["contextId"] = json!(context_id);
        }

        let response = self.send("Runtime.evaluate", params).await?;
        Self::evaluation_value(response)
    }

    /// Turns a `Runtime.evaluate` response into a value or script error.
    fn evaluation_value(response: Value) -> Result<Value> {
        if let Some(details) = response.get("exceptionDetails") {
            return Err(Error::from_exception_details(details));
        }

        Ok(response
            .get("result")
            .and_then(|remote| remote.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Subscribes to the events of this session.
    #[must_use]
    pub fn events(&self) -> SessionEvents {
        let (handler_id, rx) = self.inner.transport.subscribe();
        SessionEvents {
            transport: Arc::clone(&self.inner.transport),
            session_id: self.inner.session_id.clone(),
            handler_id,
            rx,
        }
    }
}

// ============================================================================
// SessionEvents
// ============================================================================

/// Stream of the events raised on one session.
///
/// Unhooks its message handler when dropped.
pub struct SessionEvents {
    transport: Arc<dyn ProtocolTransport>,
    session_id: SessionId,
    handler_id: HandlerId,
    rx: mpsc::UnboundedReceiver<ProtocolEvent>,
}

impl SessionEvents {
    /// Receives the next event of the session.
    ///
    /// Returns `None` once the transport dropped the handler.
    pub async fn recv(&mut self) -> Option<ProtocolEvent> {
        loop {
            let event = self.rx.recv().await?;
            if event.is_for(&self.session_id) {
                return Some(event);
            }
        }
    }
}

impl Drop for SessionEvents {
    fn drop(&mut self) {
        self.transport.off_message(self.handler_id);
    }
}

// ============================================================================
// Tests
// ============================================================================
