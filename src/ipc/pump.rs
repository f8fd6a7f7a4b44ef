//! Delivery between the host bridge and the page.
//!
//! Page → host uses a push binding when the browser supports
//! `Runtime.addBinding`, otherwise a poll loop over `_get()`. Host → page
//! is a writer task evaluating `_receive(..)` for each outbound envelope.
//! A request that cannot be delivered fails its pending [`Ipc::send`].

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::protocol::{Envelope, ParsedEvent};
use crate::session::{Session, SessionEvents};

use super::bootstrap::{self, BINDING_NAME};
use super::bridge::Ipc;

// ============================================================================
// Constants
// ============================================================================

/// Longest a single `_get()` waits in the page before resolving `null`.
///
/// Kept below the transport's command timeout.
pub const POLL_WAIT: Duration = Duration::from_secs(25);

/// Pause after a failed poll while the window is still open.
pub const POLL_BACKOFF: Duration = Duration::from_millis(100);

// ============================================================================
// DeliveryMode
// ============================================================================

/// How page → host envelopes reach the bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    /// Binding when available, polling otherwise.
    #[default]
    Auto,

    /// `Runtime.addBinding` push notifications.
    Binding,

    /// Repeated `_get()` evaluations.
    Poll,
}

// ============================================================================
// DeliveryPump
// ============================================================================

/// Running page → host delivery.
#[derive(Debug)]
pub struct DeliveryPump {
    mode: DeliveryMode,
    task: JoinHandle<()>,
}

impl DeliveryPump {
    /// Starts delivery in `mode`.
    ///
    /// `Auto` resolves to `Binding` or `Poll` here. Call this before the
    /// bootstrap is injected so the page half finds the binding.
    ///
    /// # Errors
    ///
    /// Returns an error only when `Binding` was requested explicitly and
    /// the browser refused it.
    pub async fn start(
        session: &Session,
        ipc: &Ipc,
        mode: DeliveryMode,
        closed: watch::Receiver<bool>,
    ) -> Result<Self> {
        let mode = match mode {
            DeliveryMode::Poll => DeliveryMode::Poll,
            DeliveryMode::Binding => {
                add_binding(session).await?;
                DeliveryMode::Binding
            }
            DeliveryMode::Auto => match add_binding(session).await {
                Ok(()) => DeliveryMode::Binding,
                Err(e) => {
                    debug!(error = %e, "Binding unavailable, falling back to polling");
                    DeliveryMode::Poll
                }
            },
        };

        let task = match mode {
            DeliveryMode::Binding => {
                tokio::spawn(run_binding(session.events(), ipc.clone(), closed))
            }
            _ => tokio::spawn(run_poll(session.clone(), ipc.clone(), closed)),
        };

        debug!(mode = ?mode, "Delivery pump started");
        Ok(Self { mode, task })
    }

    /// Returns the resolved mode, never `Auto`.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Returns `true` once the pump task ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the pump immediately.
    pub fn abort(&self) {
        self.task.abort();
    }
}

async fn add_binding(session: &Session) -> Result<()> {
    session
        .send("Runtime.addBinding", json!({ "name": BINDING_NAME }))
        .await?;
    Ok(())
}

/// Parses a page payload and hands it to the bridge.
fn deliver(ipc: &Ipc, payload: &str) {
    match serde_json::from_str::<Envelope>(payload) {
        Ok(envelope) => ipc.dispatch(envelope),
        Err(e) => warn!(error = %e, "Unparseable envelope from page"),
    }
}

async fn run_binding(mut events: SessionEvents, ipc: Ipc, mut closed: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let ParsedEvent::BindingCalled { name, payload } = event.parse()
                    && name == BINDING_NAME
                {
                    deliver(&ipc, &payload);
                }
            }
            _ = closed.wait_for(|closed| *closed) => break,
        }
    }
    debug!("Binding pump stopped");
}

async fn run_poll(session: Session, ipc: Ipc, mut closed: watch::Receiver<bool>) {
    let wait_ms = u64::try_from(POLL_WAIT.as_millis()).unwrap_or(u64::MAX);
    let expression = bootstrap::poll_expression(wait_ms);

    loop {
        if *closed.borrow() {
            break;
        }

        let result = tokio::select! {
            result = session.evaluate(&expression) => result,
            _ = closed.wait_for(|closed| *closed) => break,
        };

        match result {
            Ok(Value::String(payload)) => deliver(&ipc, &payload),
            Ok(Value::Null) => trace!("Poll returned empty"),
            Ok(other) => warn!(value = %other, "Unexpected poll result"),
            Err(e) => {
                if *closed.borrow() {
                    break;
                }
                trace!(error = %e, "Poll failed, backing off");
                tokio::time::sleep(POLL_BACKOFF).await;
            }
        }
    }
    debug!("Poll pump stopped");
}

// ============================================================================
// Writer
// ============================================================================

/// Delivers outbound bridge envelopes to the page in order until `closed`
/// flips.
///
/// When the page rejects a request envelope, the request is resolved with
/// the delivery error instead of waiting for a reply that cannot come.
pub fn spawn_writer(
    session: Session,
    ipc: Ipc,
    mut outbound: mpsc::UnboundedReceiver<Envelope>,
    mut closed: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let envelope = tokio::select! {
                envelope = outbound.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
                _ = closed.wait_for(|closed| *closed) => break,
            };

            let encoded = match serde_json::to_string(&envelope) {
                Ok(encoded) => encoded,
                Err(e) => {
                    warn!(error = %e, "Failed to encode envelope");
                    if let Some(id) = &envelope.id {
                        ipc.fail(id, e.into());
                    }
                    continue;
                }
            };

            trace!(kind = %envelope.kind, "Delivering envelope to page");
            if let Err(e) = session
                .evaluate(&bootstrap::receive_expression(&encoded))
                .await
            {
                debug!(error = %e, kind = %envelope.kind, "Envelope delivery failed");
                if let Some(id) = &envelope.id {
                    ipc.fail(id, e);
                }
            }
        }
        debug!("Bridge writer stopped");
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::identifiers::SessionId;
    use crate::protocol::{ProtocolEvent, StoreWrite};
    use crate::protocol::envelope::{BACKEND_STORE_WRITE, REPLY};
    use crate::session::TargetFilter;
    use crate::transport::testing::MockTransport;

    async fn session(mock: &Arc<MockTransport>) -> Session {
        Session::establish(mock.clone(), &TargetFilter::AnyPage)
            .await
            .expect("establish")
    }

    #[tokio::test]
    async fn test_auto_prefers_binding() {
        let mock = MockTransport::with_page("https://a.test/");
        let session = session(&mock).await;
        let (ipc, _rx) = Ipc::new();
        let (_closed_tx, closed_rx) = watch::channel(false);

        let pump = DeliveryPump::start(&session, &ipc, DeliveryMode::Auto, closed_rx)
            .await
            .expect("start");

        assert_eq!(pump.mode(), DeliveryMode::Binding);
        assert_eq!(mock.calls_to("Runtime.addBinding")[0].params["name"], BINDING_NAME);
        pump.abort();
    }

    #[tokio::test]
    async fn test_auto_falls_back_to_poll() {
        let mock = MockTransport::with_page("https://a.test/");
        mock.fail("Runtime.addBinding", "'Runtime.addBinding' wasn't found");
        let session = session(&mock).await;
        let (ipc, _rx) = Ipc::new();
        let (_closed_tx, closed_rx) = watch::channel(false);

        let pump = DeliveryPump::start(&session, &ipc, DeliveryMode::Auto, closed_rx)
            .await
            .expect("start");

        assert_eq!(pump.mode(), DeliveryMode::Poll);
        pump.abort();
    }

    #[tokio::test]
    async fn test_explicit_binding_failure_propagates() {
        let mock = MockTransport::with_page("https://a.test/");
        mock.fail("Runtime.addBinding", "nope");
        let session = session(&mock).await;
        let (ipc, _rx) = Ipc::new();
        let (_closed_tx, closed_rx) = watch::channel(false);

        let result = DeliveryPump::start(&session, &ipc, DeliveryMode::Binding, closed_rx).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_binding_payload_is_dispatched() {
        let mock = MockTransport::with_page("https://a.test/");
        let session = session(&mock).await;
        let (ipc, mut rx) = Ipc::new();
        ipc.on("ping", |data| async move { Some(data) });
        let (closed_tx, closed_rx) = watch::channel(false);
        let pump = DeliveryPump::start(&session, &ipc, DeliveryMode::Binding, closed_rx)
            .await
            .expect("start");

        mock.emit(ProtocolEvent::new(
            "Runtime.bindingCalled",
            json!({
                "name": BINDING_NAME,
                "payload": r#"{"id":"m1","type":"ping","data":7}"#,
                "executionContextId": 1
            }),
            Some(SessionId::new("S1")),
        ));

        let answer = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("answer in time")
            .expect("answer");
        assert_eq!(answer.kind, REPLY);
        assert_eq!(answer.data, json!(7));

        closed_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(2), async {
            while !pump.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("pump stops");
    }

    #[tokio::test]
    async fn test_poll_delivers_and_stops_on_close() {
        let mock = MockTransport::with_page("https://a.test/");
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        mock.respond("Runtime.evaluate", move |params| {
            let expression = params["expression"].as_str().unwrap_or_default();
            if !expression.contains("_get(") {
                return Ok(json!({ "result": { "type": "undefined" } }));
            }
            if counter.fetch_add(1, Ordering::SeqCst) > 0 {
                return Err(crate::error::Error::cdp(-32000, "Execution context was destroyed."));
            }
            let payload = r#"{"type":"web store write","data":{"key":"theme","value":"dark"}}"#;
            Ok(json!({ "result": { "type": "string", "value": payload } }))
        });
        let session = session(&mock).await;
        let (ipc, _rx) = Ipc::new();
        let (closed_tx, closed_rx) = watch::channel(false);

        let pump = DeliveryPump::start(&session, &ipc, DeliveryMode::Poll, closed_rx)
            .await
            .expect("start");

        tokio::time::timeout(Duration::from_secs(2), async {
            while ipc.store().get("theme").is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("store write delivered");
        assert_eq!(ipc.store().get("theme"), Some(json!("dark")));

        closed_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(2), async {
            while !pump.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("pump stops");

        let after = mock.count("Runtime.evaluate");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(mock.count("Runtime.evaluate"), after);
    }

    /// Decodes the envelope carried by a `_receive(..)` expression.
    fn received_envelope(expression: &str) -> Option<Envelope> {
        let argument = expression
            .strip_prefix("window.CdpWindow.ipc._receive(")?
            .strip_suffix(')')?;
        let encoded: String = serde_json::from_str(argument).ok()?;
        serde_json::from_str(&encoded).ok()
    }

    #[tokio::test]
    async fn test_writer_mirrors_store_into_page() {
        let mock = MockTransport::with_page("https://a.test/");
        let page_store = Arc::new(parking_lot::Mutex::new(serde_json::Map::new()));
        let mirror = Arc::clone(&page_store);
        mock.respond("Runtime.evaluate", move |params| {
            let expression = params["expression"].as_str().unwrap_or_default();
            if let Some(envelope) = received_envelope(expression)
                && envelope.kind == BACKEND_STORE_WRITE
                && let Ok(write) = serde_json::from_value::<StoreWrite>(envelope.data)
            {
                let mut page = mirror.lock();
                if write.delete {
                    page.remove(&write.key);
                } else {
                    page.insert(write.key, write.value);
                }
            }
            Ok(json!({ "result": { "type": "undefined" } }))
        });
        let session = session(&mock).await;
        let (ipc, rx) = Ipc::new();
        let (closed_tx, closed_rx) = watch::channel(false);
        let writer = spawn_writer(session, ipc.clone(), rx, closed_rx);

        ipc.store().set("theme", "dark").expect("set");
        ipc.store().set("size", 12).expect("set");
        ipc.store().set("theme", "light").expect("set");
        ipc.store().set("gone", true).expect("set");
        ipc.store().delete("gone").expect("delete");
        mock.wait_for("Runtime.evaluate", 5).await;

        let page = page_store.lock().clone();
        assert_eq!(page.get("theme"), Some(&json!("light")));
        assert_eq!(page.get("size"), Some(&json!(12)));
        assert!(!page.contains_key("gone"));
        assert_eq!(Value::Object(page), ipc.store().to_json());

        closed_tx.send_replace(true);
        writer.await.expect("writer");
    }

    #[tokio::test]
    async fn test_undeliverable_request_fails_send() {
        let mock = MockTransport::with_page("https://a.test/");
        mock.fail("Runtime.evaluate", "Execution context was destroyed.");
        let session = session(&mock).await;
        let (ipc, rx) = Ipc::new();
        let (closed_tx, closed_rx) = watch::channel(false);
        let writer = spawn_writer(session, ipc.clone(), rx, closed_rx);

        let result = tokio::time::timeout(Duration::from_secs(2), ipc.send("hello", Value::Null))
            .await
            .expect("send resolves");

        assert!(matches!(result, Err(crate::error::Error::Cdp { .. })));
        assert_eq!(ipc.pending_count(), 0);

        closed_tx.send_replace(true);
        writer.await.expect("writer");
    }
}
