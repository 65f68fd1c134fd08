//! Process-wide shutdown triggers.
//!
//! Shutdown can be requested by a termination signal, by a `shutdown`
//! command, or by the command channel reaching end of input. The first
//! request wins; later requests are no-ops. The dispatcher races the trigger
//! against both the command read and any outstanding capability call, so a
//! slow or stuck capability cannot hold the broker open.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Why the dispatcher stopped serving commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// A `shutdown` command was received.
    ShutdownCommand,
    /// A termination signal (or another [`ShutdownTrigger`] holder) asked to stop.
    Signal,
    /// The controlling process closed the command channel.
    EndOfInput,
}

/// Cloneable, set-once shutdown flag that can be awaited.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownTrigger {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request shutdown. Returns `true` only for the first request.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until shutdown has been requested.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

/// Trigger `shutdown` on SIGINT/Ctrl-C or SIGTERM.
pub fn listen_for_signals(shutdown: ShutdownTrigger) -> JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => {
                tracing::info!(signal = name, "termination signal received");
                shutdown.trigger();
            }
            Err(e) => tracing::warn!(error = %e, "could not install signal handlers"),
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
