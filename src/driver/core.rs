//! Driver coordinator and window factory.
//!
//! # Example
//!
//! ```no_run
//! use cdp_window::Driver;
//!
//! # async fn example() -> cdp_window::Result<()> {
//! let driver = Driver::builder()
//!     .binary("/usr/bin/chromium")
//!     .build()?;
//!
//! let window = driver.window().url("https://example.com").spawn().await?;
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
use rustc_hash::FxHashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::browser::{Window, WindowBuilder, WindowOptions};
use crate::error::{Error, Result};
use crate::session::TargetFilter;
use crate::transport::{Connection, ProtocolTransport};

use super::builder::DriverBuilder;
use super::launch;
use super::options::BrowserOptions;
use super::profile::Profile;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the driver.
pub(crate) struct DriverInner {
    /// Path to the browser binary.
    pub binary: PathBuf,

    /// Persistent user data directory shared by all windows.
    pub user_data_dir: Option<PathBuf>,

    /// Arguments passed to every launch.
    pub args: Vec<String>,

    /// Wait for the DevTools endpoint.
    pub launch_timeout: Duration,

    /// Open windows by id.
    pub windows: Mutex<FxHashMap<Uuid, Window>>,
}

// ============================================================================
// Driver
// ============================================================================

/// Launches browsers and tracks the windows driving them.
///
/// Each spawned window owns one browser process.
#[derive(Clone)]
pub struct Driver {
    pub(crate) inner: Arc<DriverInner>,
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("binary", &self.inner.binary)
            .field("window_count", &self.window_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Driver - Public API
// ============================================================================

impl Driver {
    /// Creates a configuration builder for the driver.
    #[inline]
    #[must_use]
    pub fn builder() -> DriverBuilder {
        DriverBuilder::new()
    }

    /// Creates a window builder.
    #[inline]
    #[must_use]
    pub fn window(&self) -> WindowBuilder<'_> {
        WindowBuilder::new(self)
    }

    /// Returns the number of open windows.
    #[inline]
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.inner.windows.lock().len()
    }

    /// Returns the open windows.
    #[must_use]
    pub fn windows(&self) -> Vec<Window> {
        self.inner.windows.lock().values().cloned().collect()
    }

    /// Closes every open window.
    ///
    /// # Errors
    ///
    /// Close failures are logged; this currently always succeeds.
    pub async fn close(&self) -> Result<()> {
        let windows: Vec<Window> = {
            let mut map = self.inner.windows.lock();
            map.drain().map(|(_, w)| w).collect()
        };

        info!(count = windows.len(), "Closing all windows");

        for window in windows {
            if let Err(e) = window.close().await {
                debug!(error = %e, "Error closing window during shutdown");
            }
        }

        Ok(())
    }
}

// ============================================================================
// Driver - Internal API
// ============================================================================

impl Driver {
    pub(crate) fn new(
        binary: PathBuf,
        user_data_dir: Option<PathBuf>,
        args: Vec<String>,
        launch_timeout: Duration,
    ) -> Self {
        debug!(binary = %binary.display(), "Driver initialized");
        Self {
            inner: Arc::new(DriverInner {
                binary,
                user_data_dir,
                args,
                launch_timeout,
                windows: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// Launches a browser and attaches a window to its startup page.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Options are invalid
    /// - Profile creation fails
    /// - The browser fails to spawn or announce its endpoint
    /// - The connection or session cannot be established
    pub(crate) async fn spawn_window(
        &self,
        browser: BrowserOptions,
        options: WindowOptions,
        user_data_dir: Option<PathBuf>,
    ) -> Result<Window> {
        let browser = BrowserOptions {
            extra_args: self
                .inner
                .args
                .iter()
                .cloned()
                .chain(browser.extra_args)
                .collect(),
            ..browser
        };
        browser.validate().map_err(Error::config)?;

        let profile = self.prepare_profile(user_data_dir.or_else(|| self.inner.user_data_dir.clone()))?;

        let (child, ws_url) = launch::launch(
            &self.inner.binary,
            &profile,
            &browser,
            self.inner.launch_timeout,
        )
        .await?;

        let connection = Connection::connect(&ws_url).await?;
        let transport: Arc<dyn ProtocolTransport> = Arc::new(connection);

        let options = WindowOptions {
            target_filter: TargetFilter::StartupPage,
            ..options
        };
        let window = Window::launch(transport, options, child).await?;

        self.track(&window, profile);

        info!(
            window_id = %window.id(),
            pid = ?window.pid(),
            window_count = self.window_count(),
            "Window spawned successfully"
        );

        Ok(window)
    }

    /// Tracks `window` until it closes. The profile lives as long.
    fn track(&self, window: &Window, profile: Profile) {
        let id = *window.id();
        self.inner.windows.lock().insert(id, window.clone());

        let driver: Weak<DriverInner> = Arc::downgrade(&self.inner);
        window.on_close(move || {
            if let Some(driver) = driver.upgrade() {
                driver.windows.lock().remove(&id);
            }
            debug!(path = %profile.path().display(), "Releasing profile");
            drop(profile);
        });
    }

    fn prepare_profile(&self, user_data_dir: Option<PathBuf>) -> Result<Profile> {
        match user_data_dir {
            Some(path) => {
                debug!(path = %path.display(), "Using persistent profile");
                Profile::from_path(path)
            }
            None => {
                debug!("Creating temporary profile");
                Profile::new_temp()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
