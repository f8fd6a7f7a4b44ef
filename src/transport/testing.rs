//! Scripted in-memory transport for unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::identifiers::{HandlerId, SessionId};
use crate::protocol::ProtocolEvent;

use super::{HandlerRegistry, MessageHandler, ProtocolTransport};

type Responder = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// One recorded command.
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: String,
    pub params: Value,
    pub session_id: Option<SessionId>,
}

/// Transport that records commands and answers them from scripted responders.
///
/// Unscripted methods answer `{}`.
pub(crate) struct MockTransport {
    calls: Mutex<Vec<RecordedCall>>,
    responders: Mutex<FxHashMap<String, Responder>>,
    handlers: HandlerRegistry,
    closed_tx: watch::Sender<bool>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        let (closed_tx, _) = watch::channel(false);
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            responders: Mutex::new(FxHashMap::default()),
            handlers: HandlerRegistry::new(),
            closed_tx,
        })
    }

    /// Mock that serves one page target at `url` on session `S1`.
    pub(crate) fn with_page(url: &str) -> Arc<Self> {
        let mock = Self::new();
        let url = url.to_string();
        mock.respond_value(
            "Target.getTargets",
            json!({ "targetInfos": [
                { "targetId": "T1", "type": "page", "title": "", "url": url, "attached": false }
            ]}),
        );
        mock.respond_value("Target.attachToTarget", json!({ "sessionId": "S1" }));
        mock.respond_value(
            "Browser.getVersion",
            json!({
                "protocolVersion": "1.3",
                "product": "Chrome/120.0.6099.71",
                "revision": "@abc",
                "userAgent": "Mozilla/5.0",
                "jsVersion": "12.0.267.8"
            }),
        );
        mock
    }

    pub(crate) fn respond<F>(&self, method: &str, responder: F)
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.responders
            .lock()
            .insert(method.to_string(), Arc::new(responder));
    }

    pub(crate) fn respond_value(&self, method: &str, value: Value) {
        self.respond(method, move |_| Ok(value.clone()));
    }

    pub(crate) fn fail(&self, method: &str, message: &str) {
        let message = message.to_string();
        self.respond(method, move |_| Err(Error::cdp(-32000, message.clone())));
    }

    pub(crate) fn emit(&self, event: ProtocolEvent) {
        self.handlers.dispatch(&event);
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub(crate) fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    pub(crate) fn count(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.method == method).count()
    }

    pub(crate) fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Waits until `method` has been called at least `n` times.
    pub(crate) async fn wait_for(&self, method: &str, n: usize) {
        let waited = tokio::time::timeout(Duration::from_secs(2), async {
            while self.count(method) < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;

        assert!(
            waited.is_ok(),
            "timed out waiting for {n} call(s) to {method}, saw {}",
            self.count(method)
        );
    }
}

#[async_trait]
impl ProtocolTransport for MockTransport {
    async fn send(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&SessionId>,
    ) -> Result<Value> {
        if *self.closed_tx.borrow() {
            return Err(Error::ConnectionClosed);
        }

        self.calls.lock().push(RecordedCall {
            method: method.to_string(),
            params: params.clone(),
            session_id: session_id.cloned(),
        });

        let responder = self.responders.lock().get(method).cloned();
        match responder {
            Some(responder) => responder(&params),
            None => Ok(json!({})),
        }
    }

    fn on_message(&self, handler: MessageHandler) -> HandlerId {
        self.handlers.add(handler)
    }

    fn off_message(&self, id: HandlerId) -> bool {
        self.handlers.remove(id)
    }

    fn close(&self) {
        self.closed_tx.send_replace(true);
    }

    fn closed(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }
}
