// Application state module
// Shared by every connection task for the lifetime of the server

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::types::Config;
use crate::handler::EdgeHandler;

/// Application state
pub struct AppState {
    pub config: Config,
    pub handler: EdgeHandler,
    /// Cancelled once on SIGTERM/SIGINT; every connection task watches it
    pub shutdown: CancellationToken,

    // Cached config values for fast access without reading the config
    pub cached_access_log: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: &Config, handler: EdgeHandler) -> Self {
        Self {
            config: config.clone(),
            handler,
            shutdown: CancellationToken::new(),
            cached_access_log: Arc::new(AtomicBool::new(config.logging.access_log)),
        }
    }

    pub fn access_log_enabled(&self) -> bool {
        self.cached_access_log.load(Ordering::Relaxed)
    }
}
