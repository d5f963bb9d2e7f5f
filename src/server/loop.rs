// Server loop module
// Accepts connections until a shutdown is requested, then drains

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run the accept loop on `listener` until `shutdown` is notified.
///
/// After shutdown the listener is closed and in-flight connections get up to
/// `performance.write_timeout` seconds to finish.
#[allow(clippy::ignored_unit_patterns)]
pub async fn run_server(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
) -> std::io::Result<()> {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => accept_connection(stream, peer_addr, &state),
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            _ = shutdown.notified() => {
                logger::log_shutdown(state.active_connections.load(Ordering::SeqCst));
                break;
            }
        }
    }

    drop(listener);
    drain_connections(&state).await;
    Ok(())
}

async fn drain_connections(state: &AppState) {
    let deadline = tokio::time::Instant::now()
        + Duration::from_secs(state.config.performance.write_timeout);

    while state.active_connections.load(Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Shutdown grace period elapsed with {} connection(s) still open",
                state.active_connections.load(Ordering::SeqCst)
            ));
            return;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
    logger::log_info("All connections closed");
}
