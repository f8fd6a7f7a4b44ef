//! Shutdown triggers and the close gate.
//!
//! Every source that can end a window sends a [`ShutdownTrigger`] into one
//! channel. A single task turns triggers into `Window::close`, whose first
//! step is [`CloseGate::try_close`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

// ============================================================================
// ShutdownTrigger
// ============================================================================

/// Why a window is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// The browser process exited.
    ProcessExited,

    /// The protocol connection went away.
    TransportClosed,

    /// The host received a termination signal.
    Signal(SignalKind),
}

impl ShutdownTrigger {
    /// Exit code the host should terminate with, if any.
    #[must_use]
    pub fn exit_code(self) -> Option<i32> {
        match self {
            Self::Signal(kind) => Some(kind.exit_code()),
            _ => None,
        }
    }
}

/// Termination signals the window reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGINT or Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// SIGUSR1.
    User1,
    /// SIGUSR2.
    User2,
}

impl SignalKind {
    /// Conventional `128 + signo` exit code.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        128 + match self {
            Self::Interrupt => 2,
            Self::Terminate => 15,
            Self::User1 => 10,
            Self::User2 => 12,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::User1 => "SIGUSR1",
            Self::User2 => "SIGUSR2",
        })
    }
}

// ============================================================================
// CloseGate
// ============================================================================

/// Monotonic `false → true` flag. Only the first [`try_close`] wins.
///
/// [`try_close`]: CloseGate::try_close
#[derive(Debug, Default)]
pub struct CloseGate {
    closed: AtomicBool,
}

impl CloseGate {
    /// Creates an open gate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
        }
    }

    /// Closes the gate. Returns `true` only for the call that closed it.
    pub fn try_close(&self) -> bool {
        self.closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns `true` once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// ============================================================================
// Signals
// ============================================================================

/// Forwards termination signals as [`ShutdownTrigger::Signal`].
///
/// Runs until `triggers` is closed.
#[cfg(unix)]
pub fn listen_for_signals(triggers: mpsc::UnboundedSender<ShutdownTrigger>) -> JoinHandle<()> {
    use tokio::signal::unix::{SignalKind as UnixSignal, signal};

    tokio::spawn(async move {
        let (Ok(mut int), Ok(mut term), Ok(mut usr1), Ok(mut usr2)) = (
            signal(UnixSignal::interrupt()),
            signal(UnixSignal::terminate()),
            signal(UnixSignal::user_defined1()),
            signal(UnixSignal::user_defined2()),
        ) else {
            debug!("Failed to install signal handlers");
            return;
        };

        loop {
            let kind = tokio::select! {
                _ = int.recv() => SignalKind::Interrupt,
                _ = term.recv() => SignalKind::Terminate,
                _ = usr1.recv() => SignalKind::User1,
                _ = usr2.recv() => SignalKind::User2,
                _ = triggers.closed() => break,
            };

            info!(signal = %kind, "Termination signal received");
            if triggers.send(ShutdownTrigger::Signal(kind)).is_err() {
                break;
            }
        }
    })
}

/// Forwards Ctrl-C as [`ShutdownTrigger::Signal`].
#[cfg(not(unix))]
pub fn listen_for_signals(triggers: mpsc::UnboundedSender<ShutdownTrigger>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if result.is_err() {
                        debug!("Failed to install Ctrl-C handler");
                        return;
                    }
                }
                _ = triggers.closed() => break,
            }

            info!(signal = %SignalKind::Interrupt, "Termination signal received");
            if triggers
                .send(ShutdownTrigger::Signal(SignalKind::Interrupt))
                .is_err()
            {
                break;
            }
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    #[test]
    fn test_gate_closes_once() {
        let gate = CloseGate::new();
        assert!(!gate.is_closed());
        assert!(gate.try_close());
        assert!(!gate.try_close());
        assert!(gate.is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_gate_has_single_winner_under_contention() {
        let gate = Arc::new(CloseGate::new());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let gate = Arc::clone(&gate);
            tasks.push(tokio::spawn(async move { gate.try_close() }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.expect("join") {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ShutdownTrigger::Signal(SignalKind::Interrupt).exit_code(), Some(130));
        assert_eq!(ShutdownTrigger::Signal(SignalKind::Terminate).exit_code(), Some(143));
        assert_eq!(ShutdownTrigger::ProcessExited.exit_code(), None);
    }
}
