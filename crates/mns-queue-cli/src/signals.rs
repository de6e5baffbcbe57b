//! Translates process signals into a [`ShutdownSignal`].

use mns_queue::ShutdownSignal;
use tokio::task::JoinHandle;
use tracing::info;

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;

/// Trigger `shutdown` on SIGINT, SIGTERM or SIGHUP
///
/// The worker finishes its current reserve/handle/acknowledge cycle before
/// stopping. Handlers are registered before this returns.
#[cfg(unix)]
pub fn install(shutdown: ShutdownSignal) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
            _ = hangup.recv() => "SIGHUP",
        };

        info!(signal = name, "Shutdown requested, stopping after the current message");
        shutdown.trigger();
    }))
}

#[cfg(not(unix))]
pub fn install(shutdown: ShutdownSignal) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested, stopping after the current message");
                shutdown.trigger();
            }
            Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl+C"),
        }
    }))
}
