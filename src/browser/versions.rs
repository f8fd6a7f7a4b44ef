//! Browser and script-engine version metadata.

use serde::Serialize;

use crate::protocol::BrowserVersion;

/// Version metadata exposed on the window and to the page as
/// `CdpWindow.versions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Versions {
    /// Product name without the headless prefix, e.g. `Chrome`.
    pub product: String,
    /// Full browser version, e.g. `120.0.6099.71`.
    pub browser: String,
    /// Browser major version.
    pub browser_major: u32,
    /// Rendering engine family: `chromium`, `gecko` or `unknown`.
    pub engine: String,
    /// Script engine: `v8`, `spidermonkey` or `unknown`.
    pub js_engine: String,
    /// Script engine version.
    pub js_version: String,
    /// Script engine major version.
    pub js_major: u32,
}

impl Versions {
    /// Derives the metadata from a `Browser.getVersion` result.
    #[must_use]
    pub fn from_browser_version(version: &BrowserVersion) -> Self {
        let (name, browser) = version
            .product
            .split_once('/')
            .unwrap_or((version.product.as_str(), ""));
        let product = name.strip_prefix("Headless").unwrap_or(name).to_string();

        let (engine, js_engine) = match product.as_str() {
            "Firefox" => ("gecko", "spidermonkey"),
            "Chrome" | "Chromium" | "Edge" | "Edg" | "Opera" | "Brave" => ("chromium", "v8"),
            _ => ("unknown", "unknown"),
        };

        Self {
            browser_major: major(browser),
            browser: browser.to_string(),
            product,
            engine: engine.to_string(),
            js_engine: js_engine.to_string(),
            js_major: major(&version.js_version),
            js_version: version.js_version.clone(),
        }
    }

    /// Returns the metadata as JSON for the page half.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn major(version: &str) -> u32 {
    version
        .split('.')
        .next()
        .and_then(|part| part.parse().ok())
        .unwrap_or(0)
}
