// Signal handling module
//
// SIGTERM and SIGINT (Ctrl+C) request a graceful shutdown: the accept loop
// stops and open connections are given time to finish.

use std::sync::Arc;
use tokio::sync::Notify;

use crate::logger;

/// Register signal handlers and notify `shutdown` on the first one received.
///
/// Must be called from inside a tokio runtime. The notification stores a
/// permit, so a signal arriving before the accept loop waits is not lost.
#[cfg(unix)]
pub fn start_signal_handler(shutdown: Arc<Notify>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        logger::log_info(&format!("{name} received, initiating graceful shutdown"));
        shutdown.notify_one();
    });
    Ok(())
}

/// Non-unix fallback, only Ctrl+C is handled
#[cfg(not(unix))]
pub fn start_signal_handler(shutdown: Arc<Notify>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            logger::log_info("Ctrl+C received, initiating graceful shutdown");
            shutdown.notify_one();
        }
    });
    Ok(())
}
