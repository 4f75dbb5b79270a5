// Server module entry point
// Accept loop, connection handling and shutdown signals

pub mod connection;
pub mod listener;
pub mod signal;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::config;
use crate::logger;

// Re-export commonly used types
pub use listener::create_reusable_listener;
pub use signal::{start_signal_handler, SignalHandler};

/// How often the drain re-checks the connection count
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accept connections until shutdown is signalled, then drain
///
/// Must run inside a `LocalSet` since connections are spawned with
/// `spawn_local`. After the listener closes, open connections get up to
/// `performance.shutdown_timeout` seconds to finish; anything still running
/// is cancelled when the `LocalSet` is dropped.
pub async fn run_server(
    listener: TcpListener,
    state: Arc<config::AppState>,
    signals: Arc<SignalHandler>,
) -> std::io::Result<()> {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        connection::accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            &signals,
                        );
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = signals.wait_for_shutdown() => {
                break;
            }
        }
    }

    drop(listener);
    let grace = Duration::from_secs(state.config.performance.shutdown_timeout);
    logger::log_shutdown(active_connections.load(Ordering::SeqCst));
    let remaining = drain_connections(&active_connections, grace).await;
    logger::log_drained(remaining);
    Ok(())
}

/// Wait until no connections are active or `grace` runs out
///
/// Returns the number of connections still open at the end.
pub async fn drain_connections(active: &AtomicUsize, grace: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        let open = active.load(Ordering::SeqCst);
        if open == 0 || tokio::time::Instant::now() >= deadline {
            return open;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}
