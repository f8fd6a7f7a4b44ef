//! Browser process launch and DevTools endpoint discovery.
//!
//! The browser is started with `--remote-debugging-port=0` and announces
//! the endpoint it picked on stderr:
//!
//! ```text
//! DevTools listening on ws://127.0.0.1:40587/devtools/browser/6f1d...
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info, trace};

use crate::error::{Error, Result};

use super::options::BrowserOptions;
use super::profile::Profile;

// ============================================================================
// Constants
// ============================================================================

const DEVTOOLS_PATTERN: &str = r"DevTools listening on (ws://\S+)";

/// Arguments every launched browser gets.
const BASE_ARGS: &[&str] = &[
    "--remote-debugging-port=0",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
];

// ============================================================================
// Launch
// ============================================================================

/// Full argument list for one launch.
pub(crate) fn command_args(profile: &Profile, options: &BrowserOptions) -> Vec<String> {
    let mut args: Vec<String> = BASE_ARGS.iter().map(ToString::to_string).collect();
    args.push(format!("--user-data-dir={}", profile.path().display()));
    args.extend(options.to_args());
    args
}

/// Spawns the browser and waits for its DevTools endpoint.
///
/// The child is killed if the endpoint does not appear within `timeout`.
///
/// # Errors
///
/// - [`Error::ProcessLaunchFailed`] if the process cannot be spawned
/// - [`Error::ConnectionTimeout`] if no endpoint appears in time
/// - [`Error::Connection`] if the process exits before announcing one
pub(crate) async fn launch(
    binary: &Path,
    profile: &Profile,
    options: &BrowserOptions,
    timeout: Duration,
) -> Result<(Child, String)> {
    let mut cmd = Command::new(binary);
    cmd.args(command_args(profile, options))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(Error::process_launch_failed)?;
    let pid = child.id();
    info!(pid, binary = %binary.display(), "Browser process spawned");

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::connection("Browser stderr not captured"))?;

    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    let ws_url = tokio::time::timeout(timeout, discover_endpoint(stderr))
        .await
        .map_err(|_| Error::connection_timeout(timeout_ms))??;

    debug!(pid, url = %ws_url, "DevTools endpoint discovered");
    Ok((child, ws_url))
}

/// Reads stderr until the endpoint line, then keeps draining it.
async fn discover_endpoint(stderr: ChildStderr) -> Result<String> {
    let pattern = Regex::new(DEVTOOLS_PATTERN)
        .map_err(|e| Error::config(format!("Invalid endpoint pattern: {e}")))?;
    let mut lines = BufReader::new(stderr).lines();

    while let Some(line) = lines.next_line().await? {
        trace!(line = %line, "Browser stderr");
        if let Some(url) = parse_endpoint(&pattern, &line) {
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!(line = %line, "Browser stderr");
                }
            });
            return Ok(url);
        }
    }

    Err(Error::connection(
        "Browser exited before announcing a DevTools endpoint",
    ))
}

fn parse_endpoint(pattern: &Regex, line: &str) -> Option<String> {
    pattern
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|url| url.as_str().to_string())
}

// ============================================================================
// Tests
// ============================================================================
