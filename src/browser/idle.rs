//! Page lifecycle freezing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;
use tracing::debug;

use crate::error::Result;
use crate::session::Session;

/// Freezes and wakes the page through `Page.setWebLifecycleState`.
#[derive(Debug, Clone)]
pub struct Idle {
    session: Session,
    frozen: Arc<AtomicBool>,
}

impl Idle {
    pub(crate) fn new(session: Session) -> Self {
        Self {
            session,
            frozen: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Freezes the page. Timers and tasks stop until [`wake`](Self::wake).
    ///
    /// # Errors
    ///
    /// Returns the protocol error.
    pub async fn freeze(&self) -> Result<()> {
        self.set_state("frozen").await?;
        self.frozen.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Resumes a frozen page.
    ///
    /// # Errors
    ///
    /// Returns the protocol error.
    pub async fn wake(&self) -> Result<()> {
        self.set_state("active").await?;
        self.frozen.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Returns `true` while the page is frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    async fn set_state(&self, state: &str) -> Result<()> {
        self.session
            .send("Page.setWebLifecycleState", json!({ "state": state }))
            .await?;
        debug!(state, "Lifecycle state set");
        Ok(())
    }
}
