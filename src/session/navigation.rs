//! Navigation policy and guard.
//!
//! The guard watches `Page.frameScheduledNavigation` and
//! `Page.frameNavigated` on one session and cancels navigations the
//! configured [`NavigationPolicy`] rejects. Engines that only report
//! committed navigations are handled by re-navigating the frame back to the
//! previous history entry.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use crate::error::Result;
use crate::protocol::{NavigationHistory, ParsedEvent};

use super::controller::{Session, SessionEvents};

// ============================================================================
// Constants
// ============================================================================

/// Transient blanking is never treated as a navigation.
const ABOUT_BLANK: &str = "about:blank";

// ============================================================================
// NavigationPolicy
// ============================================================================

/// Which navigations a window accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NavigationPolicy {
    /// Every navigation is allowed.
    AllowAll,

    /// Only navigations that stay on the current origin.
    #[default]
    SameOrigin,

    /// Only navigations to exactly the current URL.
    SameUrl,
}

impl NavigationPolicy {
    /// Returns `true` if navigating from `current` to `target` is allowed.
    ///
    /// URLs that cannot be parsed never share an origin unless they are
    /// byte-identical.
    #[must_use]
    pub fn allows(self, current: &str, target: &str) -> bool {
        if target == ABOUT_BLANK {
            return true;
        }

        match self {
            Self::AllowAll => true,
            Self::SameUrl => current == target,
            Self::SameOrigin => current == target || same_origin(current, target),
        }
    }
}

/// Compares the origins of two URLs.
fn same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => {
            let (a, b) = (a.origin(), b.origin());
            a.is_tuple() && a == b
        }
        _ => false,
    }
}

// ============================================================================
// NavigationOutcome
// ============================================================================

/// What the guard did with one navigation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The event was not a navigation.
    Ignored,

    /// The navigation was allowed.
    Allowed,

    /// Loading was stopped before commit.
    Blocked,

    /// Loading was stopped and the frame re-navigated to this URL.
    Reverted(String),

    /// Loading was stopped but no earlier history entry exists.
    Unrecoverable,
}

// ============================================================================
// NavigationGuard
// ============================================================================

/// Enforces a [`NavigationPolicy`] on one session.
#[derive(Debug, Clone)]
pub struct NavigationGuard {
    session: Session,
    policy: NavigationPolicy,
    current_url: Arc<Mutex<String>>,
}

impl NavigationGuard {
    /// Creates a guard starting at `current_url`.
    #[must_use]
    pub fn new(session: Session, policy: NavigationPolicy, current_url: impl Into<String>) -> Self {
        Self {
            session,
            policy,
            current_url: Arc::new(Mutex::new(current_url.into())),
        }
    }

    /// Returns the policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> NavigationPolicy {
        self.policy
    }

    /// Returns the URL navigations are compared against.
    #[must_use]
    pub fn current_url(&self) -> String {
        self.current_url.lock().clone()
    }

    /// Applies the policy to one event.
    ///
    /// # Errors
    ///
    /// Returns an error if stopping the load fails. History recovery
    /// failures are swallowed.
    pub async fn handle(&self, event: &ParsedEvent) -> Result<NavigationOutcome> {
        match event {
            ParsedEvent::FrameScheduledNavigation { url, .. } => {
                if self.check(url) {
                    return Ok(NavigationOutcome::Allowed);
                }
                self.stop(url).await?;
                Ok(NavigationOutcome::Blocked)
            }

            ParsedEvent::FrameNavigated {
                frame_id,
                parent_id,
                url,
            } => {
                if self.check(url) {
                    if parent_id.is_none() && url != ABOUT_BLANK {
                        *self.current_url.lock() = url.clone();
                    }
                    return Ok(NavigationOutcome::Allowed);
                }
                self.stop(url).await?;
                Ok(self.revert(frame_id).await)
            }

            _ => Ok(NavigationOutcome::Ignored),
        }
    }

    fn check(&self, target: &str) -> bool {
        let current = self.current_url.lock();
        self.policy.allows(&current, target)
    }

    async fn stop(&self, url: &str) -> Result<()> {
        debug!(
            url,
            current = %self.current_url(),
            policy = ?self.policy,
            "Navigation blocked"
        );
        self.session.send("Page.stopLoading", json!({})).await?;
        Ok(())
    }

    /// Re-navigates `frame_id` to the entry before the current one.
    async fn revert(&self, frame_id: &str) -> NavigationOutcome {
        let history = match self.session.send("Page.getNavigationHistory", json!({})).await {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Navigation history unavailable");
                return NavigationOutcome::Unrecoverable;
            }
        };

        let Ok(history) = serde_json::from_value::<NavigationHistory>(history) else {
            return NavigationOutcome::Unrecoverable;
        };

        let Some(previous) = history.previous() else {
            return NavigationOutcome::Unrecoverable;
        };

        let url = previous.url.clone();
        let result = self
            .session
            .send("Page.navigate", json!({ "url": url, "frameId": frame_id }))
            .await;

        match result {
            Ok(_) => {
                debug!(url = %url, frame_id, "Navigation reverted");
                NavigationOutcome::Reverted(url)
            }
            Err(e) => {
                debug!(error = %e, "Navigation revert failed");
                NavigationOutcome::Unrecoverable
            }
        }
    }

    /// Runs the guard over `events` until `closed` flips.
    pub fn spawn(self, mut events: SessionEvents, mut closed: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                    _ = closed.wait_for(|closed| *closed) => break,
                };

                if let Err(e) = self.handle(&event.parse()).await {
                    warn!(error = %e, "Navigation guard failed");
                }
            }
            debug!("Navigation guard stopped");
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
