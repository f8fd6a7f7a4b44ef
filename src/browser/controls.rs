//! Native window state: minimize, maximize, fullscreen, resize.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Error, Result};
use crate::session::Session;

/// Bounds of the native browser window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowBounds {
    /// Left offset in pixels.
    pub left: Option<i64>,
    /// Top offset in pixels.
    pub top: Option<i64>,
    /// Width in pixels.
    pub width: Option<i64>,
    /// Height in pixels.
    pub height: Option<i64>,
    /// `normal`, `minimized`, `maximized` or `fullscreen`.
    pub window_state: Option<String>,
}

/// Controls the native window hosting the page.
#[derive(Debug, Clone)]
pub struct Controls {
    session: Session,
}

impl Controls {
    pub(crate) fn new(session: Session) -> Self {
        Self { session }
    }

    /// Minimizes the window.
    ///
    /// # Errors
    ///
    /// Returns the protocol error.
    pub async fn minimize(&self) -> Result<()> {
        self.set_state("minimized").await
    }

    /// Maximizes the window.
    ///
    /// # Errors
    ///
    /// Returns the protocol error.
    pub async fn maximize(&self) -> Result<()> {
        self.set_state("maximized").await
    }

    /// Restores the window to its normal state.
    ///
    /// # Errors
    ///
    /// Returns the protocol error.
    pub async fn show(&self) -> Result<()> {
        self.set_state("normal").await
    }

    /// Makes the window fullscreen.
    ///
    /// # Errors
    ///
    /// Returns the protocol error.
    pub async fn fullscreen(&self) -> Result<()> {
        self.set_state("fullscreen").await
    }

    /// Resizes the window. The window is restored first.
    ///
    /// # Errors
    ///
    /// Returns the protocol error.
    pub async fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.show().await?;
        let (window_id, _) = self.window().await?;
        self.session
            .transport()
            .send(
                "Browser.setWindowBounds",
                json!({ "windowId": window_id, "bounds": { "width": width, "height": height } }),
                None,
            )
            .await?;
        Ok(())
    }

    /// Returns the current bounds.
    ///
    /// # Errors
    ///
    /// Returns the protocol error.
    pub async fn bounds(&self) -> Result<WindowBounds> {
        let (_, bounds) = self.window().await?;
        Ok(bounds)
    }

    async fn window(&self) -> Result<(i64, WindowBounds)> {
        let result = self
            .session
            .transport()
            .send(
                "Browser.getWindowForTarget",
                json!({ "targetId": self.session.target_id() }),
                None,
            )
            .await?;

        let window_id = result
            .get("windowId")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::protocol("Expected windowId in getWindowForTarget response"))?;
        let bounds = serde_json::from_value(result.get("bounds").cloned().unwrap_or_default())
            .unwrap_or_default();

        Ok((window_id, bounds))
    }

    async fn set_state(&self, state: &str) -> Result<()> {
        let (window_id, _) = self.window().await?;
        self.session
            .transport()
            .send(
                "Browser.setWindowBounds",
                json!({ "windowId": window_id, "bounds": { "windowState": state } }),
                None,
            )
            .await?;
        debug!(window_id, state, "Window state set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::session::TargetFilter;
    use crate::transport::testing::MockTransport;

    async fn controls(mock: &std::sync::Arc<MockTransport>) -> Controls {
        mock.respond_value(
            "Browser.getWindowForTarget",
            json!({
                "windowId": 3,
                "bounds": { "left": 0, "top": 0, "width": 800, "height": 600, "windowState": "normal" }
            }),
        );
        let session = Session::establish(mock.clone(), &TargetFilter::AnyPage)
            .await
            .expect("establish");
        Controls::new(session)
    }

    #[tokio::test]
    async fn test_maximize_sets_state_on_window() {
        let mock = MockTransport::with_page("https://a.test/");
        let controls = controls(&mock).await;

        controls.maximize().await.expect("maximize");

        let lookup = &mock.calls_to("Browser.getWindowForTarget")[0];
        assert_eq!(lookup.params["targetId"], "T1");
        assert!(lookup.session_id.is_none());

        let set = &mock.calls_to("Browser.setWindowBounds")[0];
        assert_eq!(set.params["windowId"], 3);
        assert_eq!(set.params["bounds"]["windowState"], "maximized");
    }

    #[tokio::test]
    async fn test_bounds() {
        let mock = MockTransport::with_page("https://a.test/");
        let bounds = controls(&mock).await.bounds().await.expect("bounds");

        assert_eq!(bounds.width, Some(800));
        assert_eq!(bounds.window_state.as_deref(), Some("normal"));
    }

    #[tokio::test]
    async fn test_resize_restores_first() {
        let mock = MockTransport::with_page("https://a.test/");
        controls(&mock).await.resize(1024, 768).await.expect("resize");

        let sets = mock.calls_to("Browser.setWindowBounds");
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].params["bounds"]["windowState"], "normal");
        assert_eq!(sets[1].params["bounds"]["width"], 1024);
    }
}
