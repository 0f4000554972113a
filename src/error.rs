//! Startup and configuration errors
//!
//! Per-request failures live next to the component that raises them
//! (`ProxyError`, `AssetError`, `FetchError`, `CacheError`, `RenderError`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid listen address {0}")]
    InvalidAddress(String),

    #[error("invalid redirect for '{path}': {reason}")]
    InvalidRedirect { path: String, reason: String },

    #[error("invalid image proxy configuration: {0}")]
    InvalidImageProxy(String),

    #[error("invalid renderer upstream {0}")]
    InvalidRenderer(String),
}
