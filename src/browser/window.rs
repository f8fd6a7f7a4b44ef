//! Browser window lifecycle.
//!
//! Each [`Window`] owns:
//! - One attached debugging session on one page target
//! - One IPC bridge and its delivery tasks
//! - Optionally one browser process
//!
//! # Example
//!
//! ```no_run
//! use cdp_window::{Driver, NavigationPolicy};
//!
//! # async fn example() -> cdp_window::Result<()> {
//! let driver = Driver::builder()
//!     .binary("/usr/bin/chromium")
//!     .build()?;
//!
//! let window = driver.window()
//!     .url("https://example.com")
//!     .size(1280, 800)
//!     .navigation(NavigationPolicy::SameOrigin)
//!     .spawn()
//!     .await?;
//!
//! let reply = window.ipc().send("hello", serde_json::json!("world")).await?;
//!
//! window.close().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::driver::{BrowserOptions, Driver};
use crate::error::Result;
use crate::ipc::bootstrap;
use crate::ipc::pump::POLL_WAIT;
use crate::ipc::{DeliveryMode, DeliveryPump, Ipc, spawn_writer};
use crate::protocol::BrowserVersion;
use crate::session::{Injection, NavigationGuard, NavigationPolicy, Session, TargetFilter};
use crate::transport::ProtocolTransport;

use super::cache::ScriptCache;
use super::controls::Controls;
use super::idle::Idle;
use super::page::Page;
use super::process::ProcessGuard;
use super::resources::Resources;
use super::shutdown::{CloseGate, ShutdownTrigger, listen_for_signals};
use super::versions::Versions;

// ============================================================================
// Constants
// ============================================================================

/// How long `Browser.close` may take before the connection is dropped.
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// WindowOptions
// ============================================================================

/// Window behavior, independent of how the browser was started.
#[derive(Debug, Clone)]
pub struct WindowOptions {
    /// URL navigations are first compared against. Defaults to the URL of
    /// the acquired target.
    pub url: Option<String>,

    /// Navigation policy.
    pub navigation: NavigationPolicy,

    /// Page → host delivery mode.
    pub delivery: DeliveryMode,

    /// Which target to attach to.
    pub target_filter: TargetFilter,

    /// Close the window and exit the host on termination signals.
    pub handle_signals: bool,

    /// Directory for the persistent compilation cache.
    pub script_cache: Option<PathBuf>,

    /// Grace period for `Browser.close`.
    pub close_timeout: Duration,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            url: None,
            navigation: NavigationPolicy::default(),
            delivery: DeliveryMode::default(),
            target_filter: TargetFilter::default(),
            handle_signals: true,
            script_cache: None,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl WindowOptions {
    /// Creates the default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the starting URL.
    #[inline]
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the navigation policy.
    #[inline]
    #[must_use]
    pub fn with_navigation(mut self, policy: NavigationPolicy) -> Self {
        self.navigation = policy;
        self
    }

    /// Sets the delivery mode.
    #[inline]
    #[must_use]
    pub fn with_delivery(mut self, mode: DeliveryMode) -> Self {
        self.delivery = mode;
        self
    }

    /// Sets the target filter.
    #[inline]
    #[must_use]
    pub fn with_target_filter(mut self, filter: TargetFilter) -> Self {
        self.target_filter = filter;
        self
    }

    /// Enables or disables signal handling.
    #[inline]
    #[must_use]
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Enables the compilation cache in `dir`.
    #[inline]
    #[must_use]
    pub fn with_script_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_cache = Some(dir.into());
        self
    }

    /// Sets the `Browser.close` grace period.
    #[inline]
    #[must_use]
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

// ============================================================================
// Types
// ============================================================================

type CloseHandler = Box<dyn FnOnce() + Send + 'static>;

/// Internal shared state for a window.
struct WindowInner {
    id: Uuid,
    gate: CloseGate,
    closed_tx: watch::Sender<bool>,
    transport: Arc<dyn ProtocolTransport>,
    session: Session,
    versions: Versions,
    guard: NavigationGuard,
    injection: Injection,
    ipc: Ipc,
    pump: DeliveryPump,
    page: Page,
    idle: Idle,
    controls: Controls,
    resources: Resources,
    cache: Option<ScriptCache>,
    close_handlers: Mutex<Vec<CloseHandler>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    process: Mutex<Option<ProcessGuard>>,
    pid: Option<u32>,
    close_timeout: Duration,
}

// ============================================================================
// Window
// ============================================================================

/// A browser page driven as an application window.
///
/// Cheap to clone. Closing any clone closes the window.
#[derive(Clone)]
pub struct Window {
    inner: Arc<WindowInner>,
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.inner.id)
            .field("session", &self.inner.session)
            .field("pid", &self.inner.pid)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Window - Constructors
// ============================================================================

impl Window {
    /// Attaches to an already running browser.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be established or the bridge
    /// cannot be installed.
    pub async fn attach(
        transport: Arc<dyn ProtocolTransport>,
        options: WindowOptions,
    ) -> Result<Self> {
        Self::start(transport, options, None).await
    }

    /// Attaches to a browser this window owns. The process is killed when
    /// the window closes, and its exit closes the window.
    pub(crate) async fn launch(
        transport: Arc<dyn ProtocolTransport>,
        options: WindowOptions,
        child: Child,
    ) -> Result<Self> {
        Self::start(transport, options, Some(child)).await
    }

    async fn start(
        transport: Arc<dyn ProtocolTransport>,
        options: WindowOptions,
        child: Option<Child>,
    ) -> Result<Self> {
        let (triggers_tx, triggers_rx) = mpsc::unbounded_channel();

        // Kills the child if anything below fails.
        let process = child.map(|child| ProcessGuard::monitor(child, triggers_tx.clone()));
        let pid = process.as_ref().map(ProcessGuard::pid);

        let session = Session::establish(Arc::clone(&transport), &options.target_filter).await?;
        let versions = Self::fetch_versions(transport.as_ref()).await;

        let (closed_tx, closed_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        let start_url = options
            .url
            .clone()
            .unwrap_or_else(|| session.target_url().to_string());
        let guard = NavigationGuard::new(session.clone(), options.navigation, start_url);
        tasks.push(guard.clone().spawn(session.events(), closed_rx.clone()));

        let (ipc, outbound) = Ipc::new();
        tasks.push(spawn_writer(
            session.clone(),
            ipc.clone(),
            outbound,
            closed_rx.clone(),
        ));
        let pump = DeliveryPump::start(&session, &ipc, options.delivery, closed_rx.clone()).await?;

        let poll_wait_ms = u64::try_from(POLL_WAIT.as_millis()).unwrap_or(u64::MAX);
        let script = bootstrap::render(&versions.to_json(), poll_wait_ms);
        let injection = Injection::install(&session, script).await?;
        tasks.push(injection.clone().spawn(session.events(), closed_rx.clone()));

        let cache = match &options.script_cache {
            Some(dir) => {
                let cache = ScriptCache::open(session.clone(), dir.clone()).await?;
                tasks.push(cache.spawn(session.events(), closed_rx.clone()));
                Some(cache)
            }
            None => None,
        };

        tasks.push(Self::watch_transport(
            transport.as_ref(),
            closed_rx,
            triggers_tx.clone(),
        ));

        if options.handle_signals {
            tasks.push(listen_for_signals(triggers_tx.clone()));
        }

        let inner = Arc::new(WindowInner {
            id: Uuid::new_v4(),
            gate: CloseGate::new(),
            closed_tx,
            page: Page::new(session.clone()),
            idle: Idle::new(session.clone()),
            controls: Controls::new(session.clone()),
            resources: Resources::new(session.clone()),
            transport,
            session,
            versions,
            guard,
            injection,
            ipc,
            pump,
            cache,
            close_handlers: Mutex::new(Vec::new()),
            tasks: Mutex::new(tasks),
            process: Mutex::new(process),
            pid,
            close_timeout: options.close_timeout,
        });

        Self::spawn_shutdown(Arc::downgrade(&inner), triggers_rx);

        let window = Self { inner };
        info!(
            window_id = %window.inner.id,
            target_id = %window.inner.session.target_id(),
            product = %window.inner.versions.product,
            delivery = ?window.inner.pump.mode(),
            pid = ?pid,
            "Window ready"
        );

        Ok(window)
    }

    async fn fetch_versions(transport: &dyn ProtocolTransport) -> Versions {
        let version = match transport.send("Browser.getVersion", json!({}), None).await {
            Ok(value) => serde_json::from_value::<BrowserVersion>(value).unwrap_or_default(),
            Err(e) => {
                debug!(error = %e, "Browser version unavailable");
                BrowserVersion::default()
            }
        };
        Versions::from_browser_version(&version)
    }

    fn watch_transport(
        transport: &dyn ProtocolTransport,
        mut window_closed: watch::Receiver<bool>,
        triggers: mpsc::UnboundedSender<ShutdownTrigger>,
    ) -> JoinHandle<()> {
        let mut transport_closed = transport.closed();
        tokio::spawn(async move {
            tokio::select! {
                _ = transport_closed.wait_for(|closed| *closed) => {
                    let _ = triggers.send(ShutdownTrigger::TransportClosed);
                }
                _ = window_closed.wait_for(|closed| *closed) => {}
            }
        })
    }

    /// Turns triggers into closes. Signal triggers then exit the host.
    fn spawn_shutdown(
        inner: Weak<WindowInner>,
        mut triggers: mpsc::UnboundedReceiver<ShutdownTrigger>,
    ) {
        tokio::spawn(async move {
            while let Some(trigger) = triggers.recv().await {
                debug!(trigger = ?trigger, "Shutdown triggered");

                if let Some(inner) = inner.upgrade()
                    && let Err(e) = (Window { inner }).close().await
                {
                    warn!(error = %e, "Window close failed");
                }

                if let Some(code) = trigger.exit_code() {
                    info!(code, "Exiting after termination signal");
                    std::process::exit(code);
                }
            }
        });
    }
}

// ============================================================================
// Window - Accessors
// ============================================================================

impl Window {
    /// Returns the host-side unique id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &Uuid {
        &self.inner.id
    }

    /// Returns the debugging session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Returns the browser version metadata.
    #[inline]
    #[must_use]
    pub fn versions(&self) -> &Versions {
        &self.inner.versions
    }

    /// Returns the IPC bridge.
    #[inline]
    #[must_use]
    pub fn ipc(&self) -> &Ipc {
        &self.inner.ipc
    }

    /// Returns the page API.
    #[inline]
    #[must_use]
    pub fn page(&self) -> &Page {
        &self.inner.page
    }

    /// Returns the lifecycle API.
    #[inline]
    #[must_use]
    pub fn idle(&self) -> &Idle {
        &self.inner.idle
    }

    /// Returns the native window controls.
    #[inline]
    #[must_use]
    pub fn controls(&self) -> &Controls {
        &self.inner.controls
    }

    /// Returns the resource API.
    #[inline]
    #[must_use]
    pub fn resources(&self) -> &Resources {
        &self.inner.resources
    }

    /// Returns the compilation cache, if enabled.
    #[inline]
    #[must_use]
    pub fn cache(&self) -> Option<&ScriptCache> {
        self.inner.cache.as_ref()
    }

    /// Returns the installed bootstrap.
    #[inline]
    #[must_use]
    pub fn injection(&self) -> &Injection {
        &self.inner.injection
    }

    /// Returns the URL navigations are compared against.
    #[must_use]
    pub fn current_url(&self) -> String {
        self.inner.guard.current_url()
    }

    /// Returns the navigation policy.
    #[inline]
    #[must_use]
    pub fn navigation_policy(&self) -> NavigationPolicy {
        self.inner.guard.policy()
    }

    /// Returns the resolved delivery mode.
    #[inline]
    #[must_use]
    pub fn delivery_mode(&self) -> DeliveryMode {
        self.inner.pump.mode()
    }

    /// Returns the browser process ID if this window owns the process.
    #[inline]
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    /// Returns `true` once the window was closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.gate.is_closed()
    }
}

// ============================================================================
// Window - Lifecycle
// ============================================================================

impl Window {
    /// Registers a handler run once when the window closes, before the
    /// connection is torn down. Handlers run in registration order.
    ///
    /// Handlers registered after close are dropped. Handlers also run when
    /// the last handle of an open window is dropped, such as on host exit
    /// through `main` returning.
    pub fn on_close<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closed() {
            debug!(window_id = %self.inner.id, "Close handler registered after close");
            return;
        }
        self.inner.close_handlers.lock().push(Box::new(handler));
    }

    /// Waits until the window is closed, by any trigger.
    pub async fn wait(&self) {
        let mut closed = self.inner.closed_tx.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Closes the window.
    ///
    /// The first call runs the close handlers, rejects pending bridge
    /// requests, asks the browser to close, drops the connection and
    /// kills an owned process. Returns `true` for that call and `false`
    /// for every later one.
    ///
    /// # Errors
    ///
    /// Teardown failures are logged; this currently always succeeds.
    pub async fn close(&self) -> Result<bool> {
        if !self.inner.gate.try_close() {
            return Ok(false);
        }

        debug!(window_id = %self.inner.id, "Closing window");
        self.inner.closed_tx.send_replace(true);

        let handlers = std::mem::take(&mut *self.inner.close_handlers.lock());
        for handler in handlers {
            handler();
        }

        self.inner.ipc.close();
        self.inner.pump.abort();

        let browser_close = self.inner.transport.send("Browser.close", json!({}), None);
        match tokio::time::timeout(self.inner.close_timeout, browser_close).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(error = %e, "Browser.close failed"),
            Err(_) => debug!("Browser.close timed out"),
        }
        self.inner.transport.close();

        let process = self.inner.process.lock().take();
        if let Some(mut process) = process {
            process.kill().await;
        }

        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }

        info!(window_id = %self.inner.id, "Window closed");
        Ok(true)
    }
}

/// Dropping the last handle of an open window runs the synchronous part
/// of [`Window::close`]. The browser is killed with the process guard.
impl Drop for WindowInner {
    fn drop(&mut self) {
        if !self.gate.try_close() {
            return;
        }

        debug!(window_id = %self.id, "Window dropped while open");
        self.closed_tx.send_replace(true);

        for handler in std::mem::take(self.close_handlers.get_mut()) {
            handler();
        }

        self.ipc.close();
        self.pump.abort();
        self.transport.close();

        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

// ============================================================================
// WindowBuilder
// ============================================================================

/// Builder for spawning windows from a [`Driver`].
///
/// # Example
///
/// ```no_run
/// # use cdp_window::Driver;
/// # async fn example() -> cdp_window::Result<()> {
/// # let driver = Driver::builder().binary("/usr/bin/chromium").build()?;
/// let window = driver.window()
///     .url("https://example.com")
///     .headless()
///     .size(1920, 1080)
///     .spawn()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct WindowBuilder<'a> {
    driver: &'a Driver,
    browser: BrowserOptions,
    window: WindowOptions,
    user_data_dir: Option<PathBuf>,
}

impl<'a> WindowBuilder<'a> {
    pub(crate) fn new(driver: &'a Driver) -> Self {
        Self {
            driver,
            browser: BrowserOptions::new(),
            window: WindowOptions::new(),
            user_data_dir: None,
        }
    }

    /// Opens `url` as the application page.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.browser = self.browser.with_app_url(url.clone());
        self.window = self.window.with_url(url);
        self
    }

    /// Runs the browser without a visible window.
    #[must_use]
    pub fn headless(mut self) -> Self {
        self.browser = self.browser.with_headless();
        self
    }

    /// Sets the window size in pixels.
    #[must_use]
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.browser = self.browser.with_window_size(width, height);
        self
    }

    /// Adds a browser command-line argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.browser = self.browser.with_arg(arg);
        self
    }

    /// Sets the navigation policy.
    #[must_use]
    pub fn navigation(mut self, policy: NavigationPolicy) -> Self {
        self.window = self.window.with_navigation(policy);
        self
    }

    /// Sets the delivery mode.
    #[must_use]
    pub fn delivery(mut self, mode: DeliveryMode) -> Self {
        self.window = self.window.with_delivery(mode);
        self
    }

    /// Enables or disables signal handling.
    #[must_use]
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.window = self.window.with_signal_handling(enabled);
        self
    }

    /// Enables the compilation cache in `dir`.
    #[must_use]
    pub fn script_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.window = self.window.with_script_cache(dir);
        self
    }

    /// Uses a persistent user data directory instead of a temporary one.
    #[must_use]
    pub fn user_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_data_dir = Some(path.into());
        self
    }

    /// Launches the browser and attaches the window.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser cannot be launched or attached.
    pub async fn spawn(self) -> Result<Window> {
        self.driver
            .spawn_window(self.browser, self.window, self.user_data_dir)
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::Value;

    use crate::error::Error;
    use crate::identifiers::SessionId;
    use crate::ipc::bootstrap::BINDING_NAME;
    use crate::protocol::ProtocolEvent;
    use crate::transport::testing::MockTransport;

    fn options() -> WindowOptions {
        WindowOptions::new().with_signal_handling(false)
    }

    async fn attach(mock: &Arc<MockTransport>) -> Window {
        Window::attach(mock.clone(), options())
            .await
            .expect("attach")
    }

    #[test]
    fn test_window_is_clone_and_debug() {
        fn assert_traits<T: Clone + fmt::Debug + Send + Sync>() {}
        assert_traits::<Window>();
    }

    #[tokio::test]
    async fn test_attach_installs_bridge_in_order() {
        let mock = MockTransport::with_page("https://a.test/x");
        let window = attach(&mock).await;

        let methods: Vec<String> = mock.calls().into_iter().map(|c| c.method).collect();
        let position = |method: &str| {
            methods
                .iter()
                .position(|m| m == method)
                .unwrap_or_else(|| panic!("{method} not called"))
        };
        assert!(position("Runtime.enable") < position("Runtime.addBinding"));
        assert!(position("Runtime.addBinding") < position("Page.addScriptToEvaluateOnNewDocument"));

        let source = &mock.calls_to("Page.addScriptToEvaluateOnNewDocument")[0].params["source"];
        assert!(source.as_str().expect("source").contains(r#""browserMajor":120"#));

        assert_eq!(window.delivery_mode(), DeliveryMode::Binding);
        assert_eq!(window.current_url(), "https://a.test/x");
        assert_eq!(window.versions().product, "Chrome");
        assert_eq!(window.pid(), None);

        window.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_runs_handlers_once() {
        let mock = MockTransport::with_page("https://a.test/x");
        let window = attach(&mock).await;
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            let order = Arc::clone(&order);
            window.on_close(move || order.lock().push(name));
        }

        assert!(window.close().await.expect("close"));
        assert!(!window.close().await.expect("close"));

        assert_eq!(*order.lock(), vec!["first", "second"]);
        assert_eq!(mock.count("Browser.close"), 1);
        assert!(window.is_closed());
        assert!(*mock.closed().borrow());
    }

    #[tokio::test]
    async fn test_dropping_open_window_runs_close_routine() {
        let mock = MockTransport::with_page("https://a.test/x");
        let window = attach(&mock).await;
        let ipc = window.ipc().clone();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        window.on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        drop(window);

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(ipc.is_closed());
        assert!(*mock.closed().borrow());
    }

    #[tokio::test]
    async fn test_dropping_closed_window_skips_handlers() {
        let mock = MockTransport::with_page("https://a.test/x");
        let window = attach(&mock).await;
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        window.on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        window.close().await.expect("close");
        drop(window);

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_close_has_one_winner() {
        let mock = MockTransport::with_page("https://a.test/x");
        let window = attach(&mock).await;
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        window.on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let (a, b) = tokio::join!(window.close(), window.close());

        assert!(a.expect("close") ^ b.expect("close"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_rejects_pending_requests() {
        let mock = MockTransport::with_page("https://a.test/x");
        let window = attach(&mock).await;

        let pending = {
            let ipc = window.ipc().clone();
            tokio::spawn(async move { ipc.send("never", Value::Null).await })
        };
        while window.ipc().pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        window.close().await.expect("close");

        assert!(matches!(pending.await.expect("join"), Err(Error::WindowClosed)));
    }

    #[tokio::test]
    async fn test_transport_loss_closes_window() {
        let mock = MockTransport::with_page("https://a.test/x");
        let window = attach(&mock).await;
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        window.on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        mock.close();
        tokio::time::timeout(Duration::from_secs(2), window.wait())
            .await
            .expect("closed in time");

        assert!(window.is_closed());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!window.close().await.expect("close"));
    }

    #[tokio::test]
    async fn test_handler_after_close_is_dropped() {
        let mock = MockTransport::with_page("https://a.test/x");
        let window = attach(&mock).await;
        window.close().await.expect("close");

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        window.on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        window.close().await.expect("close");

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_page_calls_exposed_function_end_to_end() {
        let mock = MockTransport::with_page("https://a.test/x");
        let window = attach(&mock).await;
        window
            .ipc()
            .expose("add", |args| async move {
                json!(args.iter().filter_map(Value::as_i64).sum::<i64>())
            })
            .expect("expose");
        let before = mock.count("Runtime.evaluate");

        mock.emit(ProtocolEvent::new(
            "Runtime.bindingCalled",
            json!({
                "name": BINDING_NAME,
                "payload": r#"{"id":"req-1","type":"exposed add","data":[2,3]}"#,
                "executionContextId": 1
            }),
            Some(SessionId::new("S1")),
        ));
        mock.wait_for("Runtime.evaluate", before + 1).await;

        let delivered = mock.calls_to("Runtime.evaluate").pop().expect("delivery");
        let expression = delivered.params["expression"].as_str().expect("expression");
        assert!(expression.contains(r#"\"id\":\"req-1\""#));
        assert!(expression.contains(r#"\"type\":\"reply\""#));
        assert!(expression.contains(r#"\"data\":5"#));

        window.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_blocked_navigation_through_window() {
        let mock = MockTransport::with_page("https://a.test/x");
        let window = attach(&mock).await;

        mock.emit(ProtocolEvent::new(
            "Page.frameScheduledNavigation",
            json!({ "frameId": "F1", "url": "https://b.test/y", "reason": "anchorClick", "delay": 0 }),
            Some(SessionId::new("S1")),
        ));
        mock.wait_for("Page.stopLoading", 1).await;

        window.close().await.expect("close");
    }
}
