//! Host half of the IPC bridge.
//!
//! # Reply Protocol
//!
//! Every inbound envelope is first matched against the pending table by id.
//! A match resolves the waiting [`Ipc::send`] and the envelope is consumed.
//! Otherwise the listeners for its type run in order and the first value
//! they produce is sent back as `reply`, or a bare `pong` when none did.
//! Every request therefore gets exactly one answer.
//!
//! Unmatched `reply`/`pong` envelopes are dropped and envelopes without an
//! id are never answered.
//!
//! Envelopes handed to [`Ipc::dispatch`] reach listeners in the order they
//! were dispatched. One worker task per bridge drains them.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ListenerId, MessageId};
use crate::protocol::envelope::{WEB_STORE_SYNC, WEB_STORE_WRITE, exposed_type};
use crate::protocol::{Envelope, StoreWrite};

use super::listeners::{Listener, ListenerTable, listener};
use super::store::Store;

// ============================================================================
// Types
// ============================================================================

/// Host function callable from the page by name.
pub type ExposedFn = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Value> + Send + Sync>;

/// Boxes an async closure into an [`ExposedFn`].
pub fn exposed<F, Fut>(function: F) -> ExposedFn
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Value> + Send + 'static,
{
    Arc::new(move |args: Vec<Value>| function(args).boxed())
}

type PendingTable = FxHashMap<MessageId, oneshot::Sender<Result<Value>>>;

// ============================================================================
// Ipc
// ============================================================================

struct IpcInner {
    pending: Mutex<PendingTable>,
    listeners: ListenerTable,
    store: Store,
    outbound: mpsc::UnboundedSender<Envelope>,
    inbound: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    closed: AtomicBool,
}

/// Host half of the bridge. Cheap to clone.
#[derive(Clone)]
pub struct Ipc {
    inner: Arc<IpcInner>,
}

impl fmt::Debug for Ipc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ipc")
            .field("pending", &self.pending_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Ipc - Construction
// ============================================================================

impl Ipc {
    /// Creates a bridge and the receiver of its outbound envelopes.
    ///
    /// Whoever drains the receiver delivers envelopes to the page in order.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let store = Store::new(outbound.clone());

        let ipc = Self {
            inner: Arc::new(IpcInner {
                pending: Mutex::new(FxHashMap::default()),
                listeners: ListenerTable::new(),
                store,
                outbound,
                inbound: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        };

        ipc.install_store_listeners();
        (ipc, rx)
    }

    fn install_store_listeners(&self) {
        let store = self.inner.store.clone();
        self.inner.listeners.add(
            WEB_STORE_WRITE,
            listener(move |data| {
                match serde_json::from_value::<StoreWrite>(data) {
                    Ok(write) => store.apply_remote(write),
                    Err(e) => warn!(error = %e, "Malformed web store write"),
                }
                async { None }
            }),
        );

        let store = self.inner.store.clone();
        self.inner.listeners.add(
            WEB_STORE_SYNC,
            listener(move |_| {
                let snapshot = store.to_json();
                async move { Some(snapshot) }
            }),
        );
    }
}

// ============================================================================
// Ipc - Requests
// ============================================================================

impl Ipc {
    /// Sends a request to the page and waits for its reply.
    ///
    /// Resolves with the reply's data, or `Null` for a `pong`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WindowClosed`] if the window is or becomes closed.
    pub async fn send(&self, kind: &str, data: Value) -> Result<Value> {
        let (id, rx) = self.enqueue(kind, data)?;
        trace!(message_id = %id, kind, "Bridge request sent");
        rx.await.map_err(|_| Error::WindowClosed)?
    }

    /// Like [`send`](Self::send), but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestTimeout`] when no reply arrived in time.
    pub async fn send_with_timeout(
        &self,
        kind: &str,
        data: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let (id, rx) = self.enqueue(kind, data)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(reply) => reply.map_err(|_| Error::WindowClosed)?,
            Err(_) => {
                self.inner.pending.lock().remove(&id);
                Err(Error::request_timeout(
                    id,
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            }
        }
    }

    /// Invokes a function the page exposed under `key`.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn call(&self, key: &str, args: Vec<Value>) -> Result<Value> {
        self.send(&exposed_type(key), Value::Array(args)).await
    }

    /// Registers a pending entry and queues the request.
    fn enqueue(&self, kind: &str, data: Value) -> Result<(MessageId, oneshot::Receiver<Result<Value>>)> {
        let envelope = Envelope::request(kind, data);
        let id = envelope.id.clone().ok_or_else(|| Error::protocol("Request without id"))?;
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.inner.pending.lock();
            if self.inner.closed.load(Ordering::SeqCst) {
                return Err(Error::WindowClosed);
            }
            pending.insert(id.clone(), tx);
        }

        if self.inner.outbound.send(envelope).is_err() {
            self.inner.pending.lock().remove(&id);
            return Err(Error::WindowClosed);
        }

        Ok((id, rx))
    }

    /// Resolves a pending request with `error`.
    ///
    /// Used when the request could not be delivered to the page. Returns
    /// `false` if nothing was waiting on `id`.
    pub(crate) fn fail(&self, id: &MessageId, error: Error) -> bool {
        let waiter = self.inner.pending.lock().remove(id);
        match waiter {
            Some(waiter) => {
                debug!(message_id = %id, error = %error, "Bridge request failed");
                let _ = waiter.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Queues an envelope without expecting an answer.
    pub(crate) fn post(&self, envelope: Envelope) {
        if self.inner.outbound.send(envelope).is_err() {
            trace!("Outbound channel closed, envelope dropped");
        }
    }
}

// ============================================================================
// Ipc - Listeners
// ============================================================================

impl Ipc {
    /// Registers a listener for inbound envelopes of type `kind`.
    ///
    /// Returning `Some` from the handler supplies the reply payload.
    pub fn on<F, Fut>(&self, kind: &str, handler: F) -> ListenerId
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Value>> + Send + 'static,
    {
        self.inner.listeners.add(kind, listener(handler))
    }

    /// Registers an already boxed listener.
    pub fn on_listener(&self, kind: &str, listener: Listener) -> ListenerId {
        self.inner.listeners.add(kind, listener)
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, kind: &str, id: ListenerId) -> bool {
        self.inner.listeners.remove(kind, id)
    }

    /// Exposes a host function to the page under `key`.
    ///
    /// The inbound payload is spread into positional arguments: an array
    /// as-is, `null` as no argument, anything else as a single argument.
    /// Exposing an existing key replaces it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty key.
    pub fn expose<F, Fut>(&self, key: &str, function: F) -> Result<()>
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Value> + Send + 'static,
    {
        self.expose_fn(key, exposed(function))
    }

    /// Exposes an already boxed function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty key.
    pub fn expose_fn(&self, key: &str, function: ExposedFn) -> Result<()> {
        validate_key(key)?;
        self.install_exposed(key, function);
        Ok(())
    }

    /// Exposes several functions. No function is installed if any key is
    /// invalid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty key.
    pub fn expose_all<I, K>(&self, functions: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, ExposedFn)>,
        K: Into<String>,
    {
        let functions: Vec<(String, ExposedFn)> = functions
            .into_iter()
            .map(|(key, function)| (key.into(), function))
            .collect();

        for (key, _) in &functions {
            validate_key(key)?;
        }
        for (key, function) in functions {
            self.install_exposed(&key, function);
        }
        Ok(())
    }

    /// Removes an exposed function. Returns `false` if none was exposed.
    pub fn unexpose(&self, key: &str) -> bool {
        self.inner.listeners.clear(&exposed_type(key))
    }

    fn install_exposed(&self, key: &str, function: ExposedFn) {
        self.inner.listeners.replace(
            &exposed_type(key),
            Arc::new(move |data: Value| {
                let function = Arc::clone(&function);
                async move { Some(function(spread_args(data)).await) }.boxed()
            }),
        );
        debug!(key, "Function exposed");
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::invalid_argument("Exposed function key must not be empty"));
    }
    Ok(())
}

fn spread_args(data: Value) -> Vec<Value> {
    match data {
        Value::Array(args) => args,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

// ============================================================================
// Ipc - Inbound
// ============================================================================

impl Ipc {
    /// Handles one inbound envelope to completion.
    ///
    /// Listener work is awaited; use [`dispatch`](Self::dispatch) to avoid
    /// blocking the caller.
    pub async fn receive(&self, envelope: Envelope) {
        let Some(envelope) = self.resolve(envelope) else {
            return;
        };

        let Envelope { id, kind, data } = envelope;
        let reply = self.inner.listeners.dispatch(&kind, data).await;

        let Some(id) = id else {
            trace!(kind = %kind, "Notification handled");
            return;
        };

        self.post(match reply {
            Some(data) => Envelope::reply(id, data),
            None => Envelope::pong(id),
        });
    }

    /// Resolves pending requests inline and queues everything else for
    /// the bridge's inbound worker.
    ///
    /// Listener work runs in dispatch order, one envelope at a time. Must
    /// be called within a Tokio runtime.
    pub fn dispatch(&self, envelope: Envelope) {
        let Some(envelope) = self.resolve(envelope) else {
            return;
        };

        let mut inbound = self.inner.inbound.lock();
        if self.is_closed() {
            trace!(kind = %envelope.kind, "Bridge closed, inbound envelope dropped");
            return;
        }

        let worker = inbound.get_or_insert_with(|| spawn_inbound(Arc::downgrade(&self.inner)));
        if worker.send(envelope).is_err() {
            trace!("Inbound worker gone, envelope dropped");
        }
    }

    /// Consumes replies. Returns the envelope if listeners must see it.
    fn resolve(&self, envelope: Envelope) -> Option<Envelope> {
        if let Some(id) = &envelope.id {
            let waiter = self.inner.pending.lock().remove(id);
            if let Some(waiter) = waiter {
                trace!(message_id = %id, kind = %envelope.kind, "Bridge reply received");
                let _ = waiter.send(Ok(envelope.data));
                return None;
            }
        }

        if envelope.is_reply() {
            debug!(message_id = ?envelope.id, kind = %envelope.kind, "Dropping unmatched reply");
            return None;
        }

        Some(envelope)
    }
}

/// Runs queued envelopes through [`Ipc::receive`] until the bridge is closed
/// or dropped.
fn spawn_inbound(inner: Weak<IpcInner>) -> mpsc::UnboundedSender<Envelope> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let Some(inner) = inner.upgrade() else { break };
            Ipc { inner }.receive(envelope).await;
        }
        trace!("Inbound worker stopped");
    });

    tx
}

// ============================================================================
// Ipc - Accessors & Shutdown
// ============================================================================

impl Ipc {
    /// Returns the mirrored store.
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// Returns the number of requests awaiting a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Returns `true` once the bridge was closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Closes the bridge and fails every pending request with
    /// [`Error::WindowClosed`].
    pub(crate) fn close(&self) {
        let drained: Vec<_> = {
            let mut pending = self.inner.pending.lock();
            self.inner.closed.store(true, Ordering::SeqCst);
            pending.drain().map(|(_, waiter)| waiter).collect()
        };
        self.inner.inbound.lock().take();

        if !drained.is_empty() {
            debug!(count = drained.len(), "Rejecting pending bridge requests");
        }
        for waiter in drained {
            let _ = waiter.send(Err(Error::WindowClosed));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::protocol::envelope::{BACKEND_STORE_WRITE, PONG, REPLY};

    /// Answers every outbound request with what `answer` returns.
    fn echo_page(
        ipc: &Ipc,
        mut rx: mpsc::UnboundedReceiver<Envelope>,
        answer: fn(&Envelope) -> Envelope,
    ) {
        let ipc = ipc.clone();
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                if envelope.id.is_some() {
                    ipc.dispatch(answer(&envelope));
                }
            }
        });
    }

    #[tokio::test]
    async fn test_send_resolves_with_reply() {
        let (ipc, rx) = Ipc::new();
        echo_page(&ipc, rx, |request| {
            Envelope::reply(request.id.clone().expect("id"), json!({ "echo": request.data }))
        });

        let reply = ipc.send("greet", json!("hi")).await.expect("send");

        assert_eq!(reply, json!({ "echo": "hi" }));
        assert_eq!(ipc.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_pong_resolves_with_null() {
        let (ipc, rx) = Ipc::new();
        echo_page(&ipc, rx, |request| Envelope::pong(request.id.clone().expect("id")));

        assert_eq!(ipc.send("nobody", json!(1)).await.expect("send"), Value::Null);
        assert_eq!(ipc.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unhandled_request_gets_pong() {
        let (ipc, mut rx) = Ipc::new();
        let id = MessageId::generate();

        ipc.receive(Envelope {
            id: Some(id.clone()),
            kind: "unknown".to_string(),
            data: json!(1),
        })
        .await;

        let answer = rx.try_recv().expect("answer");
        assert_eq!(answer.kind, PONG);
        assert_eq!(answer.id, Some(id));
        assert_eq!(answer.data, Value::Null);
    }

    #[tokio::test]
    async fn test_listener_order_first_defined_value() {
        let (ipc, mut rx) = Ipc::new();
        ipc.on("ping", |_| async { None });
        ipc.on("ping", |_| async { Some(json!("A")) });
        ipc.on("ping", |_| async { Some(json!("B")) });

        let request = Envelope::request("ping", Value::Null);
        let id = request.id.clone();
        ipc.receive(request).await;

        let answer = rx.try_recv().expect("answer");
        assert_eq!(answer.kind, REPLY);
        assert_eq!(answer.id, id);
        assert_eq!(answer.data, json!("A"));
    }

    #[tokio::test]
    async fn test_removed_listener_is_not_called() {
        let (ipc, mut rx) = Ipc::new();
        let id = ipc.on("ping", |_| async { Some(json!("gone")) });
        assert!(ipc.remove_listener("ping", id));

        ipc.receive(Envelope::request("ping", Value::Null)).await;

        assert_eq!(rx.try_recv().expect("answer").kind, PONG);
    }

    #[tokio::test]
    async fn test_exposed_function_round_trip() {
        let (ipc, mut rx) = Ipc::new();
        ipc.expose("add", |args| async move {
            let a = args.first().and_then(Value::as_i64).unwrap_or(0);
            let b = args.get(1).and_then(Value::as_i64).unwrap_or(0);
            json!(a + b)
        })
        .expect("expose");

        ipc.receive(Envelope::request(exposed_type("add"), json!([2, 3])))
            .await;

        let answer = rx.try_recv().expect("answer");
        assert_eq!(answer.kind, REPLY);
        assert_eq!(answer.data, json!(5));
    }

    #[tokio::test]
    async fn test_expose_spreads_arguments() {
        let (ipc, mut rx) = Ipc::new();
        ipc.expose("count", |args| async move { json!(args.len()) })
            .expect("expose");

        for (payload, expected) in [(json!(null), 0), (json!("x"), 1), (json!([1, 2, 3]), 3)] {
            ipc.receive(Envelope::request(exposed_type("count"), payload))
                .await;
            assert_eq!(rx.try_recv().expect("answer").data, json!(expected));
        }
    }

    #[tokio::test]
    async fn test_expose_rejects_empty_key_and_replaces() {
        let (ipc, mut rx) = Ipc::new();

        assert!(matches!(
            ipc.expose(" ", |_| async { Value::Null }),
            Err(Error::InvalidArgument { .. })
        ));

        ipc.expose("v", |_| async { json!(1) }).expect("expose");
        ipc.expose("v", |_| async { json!(2) }).expect("expose");
        ipc.receive(Envelope::request(exposed_type("v"), Value::Null))
            .await;
        assert_eq!(rx.try_recv().expect("answer").data, json!(2));

        assert!(ipc.unexpose("v"));
        assert!(!ipc.unexpose("v"));
    }

    #[tokio::test]
    async fn test_expose_all_is_all_or_nothing() {
        let (ipc, _rx) = Ipc::new();

        let result = ipc.expose_all([
            ("ok", exposed(|_| async { Value::Null })),
            ("", exposed(|_| async { Value::Null })),
        ]);

        assert!(result.is_err());
        assert!(!ipc.unexpose("ok"));
    }

    #[tokio::test]
    async fn test_call_sends_exposed_type() {
        let (ipc, rx) = Ipc::new();
        echo_page(&ipc, rx, |request| {
            assert_eq!(request.kind, "exposed sum");
            let total: i64 = request
                .data
                .as_array()
                .map(|args| args.iter().filter_map(Value::as_i64).sum())
                .unwrap_or(0);
            Envelope::reply(request.id.clone().expect("id"), json!(total))
        });

        let total = ipc.call("sum", vec![json!(4), json!(5)]).await.expect("call");
        assert_eq!(total, json!(9));
    }

    #[tokio::test]
    async fn test_unmatched_reply_is_dropped() {
        let (ipc, mut rx) = Ipc::new();

        ipc.receive(Envelope::pong(MessageId::generate())).await;
        ipc.receive(Envelope::reply(MessageId::generate(), json!(1)))
            .await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notification_is_not_answered() {
        let (ipc, mut rx) = Ipc::new();
        ipc.on("note", |_| async { Some(json!("ignored")) });

        ipc.receive(Envelope::notify("note", Value::Null)).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_store_mirroring_from_page() {
        let (ipc, mut rx) = Ipc::new();

        ipc.receive(Envelope::notify(
            WEB_STORE_WRITE,
            json!({ "key": "theme", "value": "dark" }),
        ))
        .await;

        assert_eq!(ipc.store().get("theme"), Some(json!("dark")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_store_sync_replies_with_snapshot() {
        let (ipc, mut rx) = Ipc::new();
        ipc.store().set("theme", "dark").expect("set");
        assert_eq!(rx.try_recv().expect("write").kind, BACKEND_STORE_WRITE);

        ipc.receive(Envelope::request(WEB_STORE_SYNC, Value::Null)).await;

        let answer = rx.try_recv().expect("answer");
        assert_eq!(answer.kind, REPLY);
        assert_eq!(answer.data, json!({ "theme": "dark" }));
    }

    #[tokio::test]
    async fn test_close_rejects_pending() {
        let (ipc, _rx) = Ipc::new();

        let waiting = {
            let ipc = ipc.clone();
            tokio::spawn(async move { ipc.send("never", Value::Null).await })
        };
        while ipc.pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        ipc.close();

        let result = waiting.await.expect("join");
        assert!(matches!(result, Err(Error::WindowClosed)));
        assert_eq!(ipc.pending_count(), 0);
        assert!(matches!(
            ipc.send("after", Value::Null).await,
            Err(Error::WindowClosed)
        ));
    }

    #[tokio::test]
    async fn test_send_with_timeout_clears_pending() {
        let (ipc, _rx) = Ipc::new();

        let result = ipc
            .send_with_timeout("slow", Value::Null, Duration::from_millis(20))
            .await;

        assert!(matches!(result, Err(Error::RequestTimeout { .. })));
        assert_eq!(ipc.pending_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dispatched_store_writes_apply_in_order() {
        for round in 0..200 {
            let (ipc, mut rx) = Ipc::new();

            for theme in ["light", "dark"] {
                ipc.dispatch(Envelope::notify(
                    WEB_STORE_WRITE,
                    json!({ "key": "theme", "value": theme }),
                ));
            }
            let sync = Envelope::request(WEB_STORE_SYNC, Value::Null);
            let sync_id = sync.id.clone();
            ipc.dispatch(sync);

            let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("snapshot in time")
                .expect("snapshot");
            assert_eq!(snapshot.id, sync_id);
            assert_eq!(snapshot.data, json!({ "theme": "dark" }), "round {round}");
            assert_eq!(ipc.store().get("theme"), Some(json!("dark")), "round {round}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dispatched_events_reach_listeners_in_order() {
        let (ipc, _rx) = Ipc::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            ipc.on("tick", move |data| {
                let seen = Arc::clone(&seen);
                async move {
                    tokio::task::yield_now().await;
                    seen.lock().push(data);
                    None
                }
            });
        }

        for i in 0..100 {
            ipc.dispatch(Envelope::notify("tick", json!(i)));
        }

        tokio::time::timeout(Duration::from_secs(2), async {
            while seen.lock().len() < 100 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("all ticks delivered");

        let expected: Vec<Value> = (0..100).map(|i| json!(i)).collect();
        assert_eq!(*seen.lock(), expected);
    }

    #[tokio::test]
    async fn test_dispatch_resolves_replies_while_listener_waits() {
        let (ipc, mut rx) = Ipc::new();
        {
            let host = ipc.clone();
            ipc.on("ask", move |_| {
                let host = host.clone();
                async move { host.send("question", Value::Null).await.ok() }
            });
        }

        let ask = Envelope::request("ask", Value::Null);
        let ask_id = ask.id.clone();
        ipc.dispatch(ask);

        let question = rx.recv().await.expect("question");
        assert_eq!(question.kind, "question");
        ipc.dispatch(Envelope::reply(question.id.expect("id"), json!(42)));

        let answer = rx.recv().await.expect("answer");
        assert_eq!(answer.id, ask_id);
        assert_eq!(answer.data, json!(42));
    }

    #[tokio::test]
    async fn test_fail_resolves_pending_with_error() {
        let (ipc, mut rx) = Ipc::new();

        let waiting = {
            let ipc = ipc.clone();
            tokio::spawn(async move { ipc.send("hello", Value::Null).await })
        };
        let request = rx.recv().await.expect("request");
        let id = request.id.expect("id");

        assert!(ipc.fail(&id, Error::protocol("undeliverable")));
        assert!(!ipc.fail(&id, Error::protocol("again")));

        let result = waiting.await.expect("join");
        assert!(matches!(result, Err(Error::Protocol { .. })));
        assert_eq!(ipc.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_correlation_totality() {
        let (ipc, rx) = Ipc::new();
        echo_page(&ipc, rx, |request| {
            if request.kind == "even" {
                Envelope::reply(request.id.clone().expect("id"), request.data.clone())
            } else {
                Envelope::pong(request.id.clone().expect("id"))
            }
        });

        let mut tasks = Vec::new();
        for i in 0..50 {
            let ipc = ipc.clone();
            let kind = if i % 2 == 0 { "even" } else { "odd" };
            tasks.push(tokio::spawn(async move { (i, ipc.send(kind, json!(i)).await) }));
        }

        for task in tasks {
            let (i, reply) = task.await.expect("join");
            let reply = reply.expect("reply");
            if i % 2 == 0 {
                assert_eq!(reply, json!(i));
            } else {
                assert_eq!(reply, Value::Null);
            }
        }
        assert_eq!(ipc.pending_count(), 0);
    }
}
