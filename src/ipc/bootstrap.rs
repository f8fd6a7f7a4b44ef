//! Page half of the bridge.
//!
//! The page half is a JavaScript template installed by the script
//! injector. It defines `window.CdpWindow` with `versions` and `ipc`, and
//! no-ops when it finds a previous install.

use serde_json::Value;

use super::store::RESERVED_KEYS;

const TEMPLATE: &str = include_str!("bootstrap.js");

/// Global the page half is installed under.
pub const GLOBAL_NAME: &str = "CdpWindow";

/// Name of the push binding installed with `Runtime.addBinding`.
pub const BINDING_NAME: &str = "__cdpWindowSend";

/// Renders the bootstrap script.
///
/// `poll_wait_ms` is how long one `_get()` call waits for an envelope
/// before resolving `null`.
#[must_use]
pub fn render(versions: &Value, poll_wait_ms: u64) -> String {
    TEMPLATE
        .replace("__BINDING__", &quoted(BINDING_NAME))
        .replace("__RESERVED__", &Value::from(RESERVED_KEYS.to_vec()).to_string())
        .replace("__POLL_WAIT_MS__", &poll_wait_ms.to_string())
        .replace("__VERSIONS__", &versions.to_string())
}

/// Expression delivering one serialized envelope to the page half.
#[must_use]
pub fn receive_expression(envelope_json: &str) -> String {
    format!("window.{GLOBAL_NAME}.ipc._receive({})", quoted(envelope_json))
}

/// Expression popping the next queued envelope from the page half.
#[must_use]
pub fn poll_expression(poll_wait_ms: u64) -> String {
    format!("window.{GLOBAL_NAME}.ipc._get({poll_wait_ms})")
}

fn quoted(text: &str) -> String {
    Value::from(text).to_string()
}
