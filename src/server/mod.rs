// Server module entry
// Listener setup, connection handling, signals and the accept loop

pub mod connection;
pub mod listener;
pub mod signal;

// `loop` is a keyword, so the module is exposed as `server_loop`
#[path = "loop.rs"]
pub mod server_loop;

pub use listener::create_reusable_listener;
pub use server_loop::start_server_loop;
pub use signal::start_signal_handler;

use std::sync::Arc;

use crate::config::AppState;
use crate::logger;

/// Bind the configured address and serve until a termination signal arrives
pub async fn run(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = state.config.get_socket_addr()?;
    let listener = create_reusable_listener(addr)?;
    let bound = listener.local_addr()?;
    logger::log_server_start(&bound, &state.config);

    start_signal_handler(state.shutdown.clone());
    start_server_loop(listener, state).await?;
    Ok(())
}
