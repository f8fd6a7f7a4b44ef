//! Browser child process ownership.
//!
//! A monitor task owns the [`Child`]. It reports an unexpected exit as
//! [`ShutdownTrigger::ProcessExited`] and performs kills requested through
//! the [`ProcessGuard`].

use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::shutdown::ShutdownTrigger;

type KillRequest = oneshot::Sender<()>;

/// Handle to a monitored browser process.
///
/// Dropping the guard kills the process.
#[derive(Debug)]
pub struct ProcessGuard {
    pid: u32,
    kill_tx: Option<oneshot::Sender<KillRequest>>,
}

impl ProcessGuard {
    /// Starts monitoring `child`.
    ///
    /// An exit that was not requested through the guard is reported on
    /// `triggers`.
    pub fn monitor(mut child: Child, triggers: mpsc::UnboundedSender<ShutdownTrigger>) -> Self {
        let pid = child.id().unwrap_or(0);
        let (kill_tx, kill_rx) = oneshot::channel::<KillRequest>();

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    info!(pid, status = ?status.ok(), "Browser process exited");
                    let _ = triggers.send(ShutdownTrigger::ProcessExited);
                }
                request = kill_rx => {
                    debug!(pid, "Killing browser process");
                    if let Err(e) = child.kill().await {
                        debug!(pid, error = %e, "Failed to kill process");
                    }
                    info!(pid, "Process terminated");
                    if let Ok(ack) = request {
                        let _ = ack.send(());
                    }
                }
            }
        });

        debug!(pid, "Process guard created");
        Self {
            pid,
            kill_tx: Some(kill_tx),
        }
    }

    /// Returns the process ID, `0` if unknown.
    #[inline]
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Kills the process and waits until it is gone.
    ///
    /// A no-op if the process already exited or was killed.
    pub async fn kill(&mut self) {
        let Some(kill_tx) = self.kill_tx.take() else {
            return;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if kill_tx.send(ack_tx).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Some(kill_tx) = self.kill_tx.take() {
            let (ack_tx, _) = oneshot::channel();
            let _ = kill_tx.send(ack_tx);
        }
    }
}
