//! Bootstrap script injection.
//!
//! A script is evaluated once in the current context, registered with
//! `Page.addScriptToEvaluateOnNewDocument` so it survives reloads, and
//! evaluated again on every `Runtime.executionContextCreated`. The script
//! itself must detect a previous install and do nothing.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::Result;
use crate::protocol::ParsedEvent;

use super::controller::{Session, SessionEvents};

/// A script installed in a session.
#[derive(Debug, Clone)]
pub struct Injection {
    session: Session,
    source: Arc<str>,
    identifier: Option<String>,
}

impl Injection {
    /// Installs `source` in the session.
    ///
    /// The immediate evaluation is best-effort: a reload racing it is
    /// tolerated since the new-document registration covers the next
    /// document.
    ///
    /// # Errors
    ///
    /// Returns an error if the new-document registration fails.
    pub async fn install(session: &Session, source: impl Into<Arc<str>>) -> Result<Self> {
        let source: Arc<str> = source.into();

        if let Err(e) = session.evaluate(&source).await {
            debug!(error = %e, "Initial bootstrap evaluation failed");
        }

        let registered = session
            .send(
                "Page.addScriptToEvaluateOnNewDocument",
                json!({ "source": &*source }),
            )
            .await?;

        let identifier = registered
            .get("identifier")
            .and_then(Value::as_str)
            .map(String::from);

        debug!(identifier = ?identifier, len = source.len(), "Bootstrap script registered");

        Ok(Self {
            session: session.clone(),
            source,
            identifier,
        })
    }

    /// Returns the new-document script identifier, if the browser gave one.
    #[inline]
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Returns the script source.
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the script again, optionally in a specific context.
    ///
    /// # Errors
    ///
    /// Returns the evaluation error.
    pub async fn reapply(&self, context_id: Option<i64>) -> Result<()> {
        self.session.evaluate_in(&self.source, context_id).await?;
        Ok(())
    }

    /// Re-evaluates the script on every new execution context until
    /// `closed` flips.
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

                if let ParsedEvent::ExecutionContextCreated { context_id, .. } = event.parse() {
                    trace!(context_id, "Reapplying bootstrap script");
                    if let Err(e) = self.reapply(Some(context_id)).await {
                        debug!(error = %e, context_id, "Bootstrap reapply failed");
                    }
                }
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
