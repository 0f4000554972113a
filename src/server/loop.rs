// Server loop module
// Accepts connections until shutdown, then drains connections and background work

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::task::TaskTracker;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Run the accept loop until `state.shutdown` is cancelled
///
/// Connections are drained first, then registered background tasks get a
/// grace period of their own; whatever is still running after that is
/// abandoned.
pub async fn start_server_loop(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    let active_connections = Arc::new(AtomicUsize::new(0));
    let connections = TaskTracker::new();

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            &connections,
                        );
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = state.shutdown.cancelled() => break,
        }
    }

    drop(listener);
    let tasks = state.handler.tasks();
    logger::log_shutdown_started(tasks.pending());

    let grace = Duration::from_secs(state.config.performance.shutdown_grace_period);

    connections.close();
    if tokio::time::timeout(grace, connections.wait()).await.is_err() {
        logger::log_warning(&format!(
            "{} connection(s) still open after grace period",
            active_connections.load(Ordering::SeqCst)
        ));
    }

    if !tasks.shutdown(grace).await {
        logger::log_warning(&format!(
            "{} background task(s) abandoned at shutdown",
            tasks.pending()
        ));
    }

    tracing::info!("Server stopped");
    Ok(())
}
