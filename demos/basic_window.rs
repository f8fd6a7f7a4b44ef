//! Application window with a host ↔ page bridge.
//!
//! Demonstrates:
//! - Launching a browser window in app mode
//! - Exposing a host function to the page
//! - Host → page requests and page → host listeners
//! - The mirrored store
//! - Close handlers
//!
//! Usage:
//!   cargo run --example basic_window
//!   cargo run --example basic_window -- --debug
//!   cargo run --example basic_window -- --no-wait
//!
//! The browser binary is read from `CDP_WINDOW_BROWSER`
//! (default `/usr/bin/chromium`).

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use cdp_window::{Driver, NavigationPolicy, Result};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_BROWSER: &str = "/usr/bin/chromium";
const APP_URL: &str = "https://example.com/";

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let debug = args.iter().any(|a| a == "--debug");
    let no_wait = args.iter().any(|a| a == "--no-wait");

    let filter = if debug { "cdp_window=debug" } else { "cdp_window=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    if let Err(e) = run(no_wait).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(no_wait: bool) -> Result<()> {
    println!("=== Basic Window ===\n");

    let binary = std::env::var("CDP_WINDOW_BROWSER").unwrap_or_else(|_| DEFAULT_BROWSER.into());
    println!("[1] Creating driver...");
    println!("    Binary: {binary}");
    let driver = Driver::builder().binary(binary).build()?;
    println!("    ✓ Driver ready\n");

    println!("[2] Spawning window...");
    let window = driver
        .window()
        .url(APP_URL)
        .size(1024, 720)
        .navigation(NavigationPolicy::SameOrigin)
        .spawn()
        .await?;
    println!("    ✓ Window spawned");
    println!("    Product:  {} {}", window.versions().product, window.versions().browser);
    println!("    Delivery: {:?}", window.delivery_mode());
    println!("    PID:      {:?}\n", window.pid());

    window.on_close(|| println!("\n    ✓ Window closed"));

    println!("[3] Exposing `add` to the page...");
    window.ipc().expose("add", |args: Vec<Value>| async move {
        json!(args.iter().filter_map(Value::as_f64).sum::<f64>())
    })?;
    let sum = window
        .page()
        .evaluate("CdpWindow.ipc.call('add', [2, 3])")
        .await?;
    println!("    ✓ add(2, 3) from the page = {sum}\n");

    println!("[4] Host → page request...");
    window
        .page()
        .evaluate("CdpWindow.ipc.on('greet', name => `hello ${name}`), true")
        .await?;
    let reply = window
        .ipc()
        .send_with_timeout("greet", json!("host"), Duration::from_secs(5))
        .await?;
    println!("    ✓ Page replied: {reply}\n");

    println!("[5] Mirrored store...");
    window.ipc().store().set("theme", "dark")?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    let theme = window.page().evaluate("CdpWindow.ipc.store.get('theme')").await?;
    println!("    ✓ Page sees theme = {theme}\n");

    if no_wait {
        println!("[--no-wait] Closing");
        window.close().await?;
    } else {
        println!("Close the window or press Ctrl+C to exit...");
        window.wait().await;
    }

    driver.close().await
}
