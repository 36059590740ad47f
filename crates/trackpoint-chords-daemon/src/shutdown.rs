//! Graceful shutdown on termination signals
//!
//! Signal delivery only records which signal arrived. The event loop notices
//! the pending request at its next wait, runs the forced deactivation, and
//! `main` then re-raises the signal with its default disposition so the exit
//! status still says how the process died.
//!
//! A second signal while that cleanup is still running ends the process at
//! once, so a mode switch that never succeeds cannot keep it alive.

use anyhow::{Context, Result};
use nix::sys::signal::{self, SigHandler, Signal};
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tokio::sync::watch;

/// Sets the pending-shutdown flag.
pub struct ShutdownTrigger {
    tx: watch::Sender<Option<Signal>>,
}

impl ShutdownTrigger {
    /// Request shutdown. The first signal wins.
    ///
    /// Returns false if shutdown was already pending.
    pub fn request(&self, signal: Signal) -> bool {
        self.tx.send_if_modified(|pending| {
            if pending.is_some() {
                return false;
            }
            *pending = Some(signal);
            true
        })
    }
}

/// Observed by the event loop.
pub struct ShutdownFlag {
    rx: watch::Receiver<Option<Signal>>,
}

impl ShutdownFlag {
    /// The signal that requested shutdown, if any.
    pub fn pending(&self) -> Option<Signal> {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&mut self) {
        if self.rx.wait_for(Option::is_some).await.is_err() {
            // Trigger gone without a request: nothing can ask for shutdown any more
            std::future::pending::<()>().await;
        }
    }
}

pub fn channel() -> (ShutdownTrigger, ShutdownFlag) {
    let (tx, rx) = watch::channel(None);
    (ShutdownTrigger { tx }, ShutdownFlag { rx })
}

/// Listen for SIGINT, SIGTERM and SIGHUP.
///
/// The first signal requests shutdown; any later one re-raises itself with the
/// default disposition. Must be called from within the tokio runtime.
pub fn listen() -> Result<ShutdownFlag> {
    listen_with(|sig| {
        if let Err(e) = reraise(sig) {
            tracing::error!("{:#}", e);
        }
    })
}

fn listen_with<F>(mut escalate: F) -> Result<ShutdownFlag>
where
    F: FnMut(Signal) + Send + 'static,
{
    let (trigger, flag) = channel();

    let mut interrupt =
        unix_signal(SignalKind::interrupt()).context("Failed to listen for SIGINT")?;
    let mut terminate =
        unix_signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;
    let mut hangup = unix_signal(SignalKind::hangup()).context("Failed to listen for SIGHUP")?;

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = interrupt.recv() => Signal::SIGINT,
                Some(()) = terminate.recv() => Signal::SIGTERM,
                Some(()) = hangup.recv() => Signal::SIGHUP,
                else => break,
            };

            if trigger.request(received) {
                tracing::info!("Received {}, shutting down...", received);
            } else {
                tracing::warn!("Received {} during shutdown, exiting immediately", received);
                escalate(received);
            }
        }
    });

    Ok(flag)
}

/// Terminate the process with `sig` under its default disposition.
pub fn reraise(sig: Signal) -> Result<()> {
    // SAFETY: SIG_DFL installs no handler code, so no async-signal-safety
    // requirements apply
    unsafe { signal::signal(sig, SigHandler::SigDfl) }
        .with_context(|| format!("Failed to restore default handler for {}", sig))?;
    signal::raise(sig).with_context(|| format!("Failed to raise {}", sig))?;
    Ok(())
}
