//! Lifecycle controller — one shutdown flag shared by every long-lived task.
//!
//! The scheduler and the metrics server each hold a receiver. The first
//! SIGINT/SIGTERM flips the flag; what a second one does depends on
//! [`SecondSignal`].

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::SecondSignal;

/// Exit status when a second signal interrupts a graceful shutdown.
pub const FORCED_EXIT_CODE: i32 = 1;

/// What a shutdown request turned out to mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    /// First request: graceful shutdown has begun.
    Initiated,
    /// Repeated request under `force-exit`: the caller should exit now.
    ForceExit,
    /// Repeated request under `ignore`: nothing changes.
    Ignored,
}

/// Owns the shutdown flag.
#[derive(Debug)]
pub struct Lifecycle {
    shutdown_tx: watch::Sender<bool>,
    second_signal: SecondSignal,
}

impl Lifecycle {
    pub fn new(second_signal: SecondSignal) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            second_signal,
        }
    }

    /// A receiver that observes the shutdown flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Set the shutdown flag. Only the first call changes anything.
    pub fn request_shutdown(&self) -> ShutdownRequest {
        let first = self.shutdown_tx.send_if_modified(|stopping| {
            if *stopping {
                false
            } else {
                *stopping = true;
                true
            }
        });

        if first {
            ShutdownRequest::Initiated
        } else {
            match self.second_signal {
                SecondSignal::ForceExit => ShutdownRequest::ForceExit,
                SecondSignal::Ignore => ShutdownRequest::Ignored,
            }
        }
    }

    /// Resolve once shutdown has been requested.
    pub async fn stopped(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so this cannot fail while we borrow it.
        let _ = rx.wait_for(|stopping| *stopping).await;
    }

    /// Feed a received signal into the lifecycle, exiting the process if
    /// this is a second signal under `force-exit`.
    pub fn on_signal(&self, signal: &'static str) {
        match self.request_shutdown() {
            ShutdownRequest::Initiated => info!(signal, "shutting down"),
            ShutdownRequest::Ignored => {
                warn!(signal, "already shutting down, signal ignored");
            }
            ShutdownRequest::ForceExit => {
                warn!(signal, "second signal during shutdown, exiting immediately");
                std::process::exit(FORCED_EXIT_CODE);
            }
        }
    }
}

/// Installed termination signal handlers.
#[cfg(unix)]
pub struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    /// Install SIGINT and SIGTERM handlers.
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Deliver every received signal to `lifecycle` until the task is aborted.
    pub async fn run(mut self, lifecycle: std::sync::Arc<Lifecycle>) {
        loop {
            let signal = tokio::select! {
                _ = self.interrupt.recv() => "SIGINT",
                _ = self.terminate.recv() => "SIGTERM",
            };
            lifecycle.on_signal(signal);
        }
    }
}

/// Installed Ctrl-C handler (non-unix targets only have this one).
#[cfg(not(unix))]
pub struct Signals;

#[cfg(not(unix))]
impl Signals {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    pub async fn run(self, lifecycle: std::sync::Arc<Lifecycle>) {
        while tokio::signal::ctrl_c().await.is_ok() {
            lifecycle.on_signal("CTRL_C");
        }
    }
}
