// Configuration module entry point
// Loads, validates and shares the static edge configuration

mod state;
mod types;

use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use crate::error::ConfigError;

// Re-export public types
pub use state::AppState;
pub use types::{
    AssetsConfig, CacheConfig, Config, HttpConfig, ImageProxyConfig, LoggingConfig,
    PerformanceConfig, RedirectSpec, RendererConfig, ServerConfig,
};

const REDIRECT_CODES: [u16; 5] = [301, 302, 303, 307, 308];

/// Environment prefix for renderer values, e.g. `EDGE__ENV__SITE_NAME`
const ENV_OVERRIDE_PREFIX: &str = "EDGE__ENV__";

/// Tables whose keys are data rather than field names
///
/// The `config` crate lowercases every key it reads, which would turn
/// `/Docs` into `/docs` and `SANITY_TOKEN` into `sanity_token`, so these
/// are parsed straight from the file instead.
#[derive(Debug, Default, Deserialize)]
struct KeyedTables {
    redirects: Option<HashMap<String, RedirectSpec>>,
    #[serde(default)]
    env: HashMap<String, String>,
}

impl KeyedTables {
    /// Read from `config_path` or `config_path.toml`, whichever exists
    fn read(config_path: &str) -> Result<Self, ConfigError> {
        let exact = Path::new(config_path);
        let with_ext = format!("{config_path}.toml");
        let path = if exact.is_file() {
            exact
        } else if Path::new(&with_ext).is_file() {
            Path::new(&with_ext)
        } else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Renderer values from `EDGE__ENV__<NAME>` variables, name case preserved
pub fn env_overrides<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(ENV_OVERRIDE_PREFIX)
                .filter(|name| !name.is_empty())
                .map(|name| (name.to_string(), value))
        })
        .collect()
}

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    ///
    /// `[redirects]` and `[env]` keep their key case. Redirects come only
    /// from the file (built-in defaults when it has none); `[env]` entries
    /// can be added or replaced with `EDGE__ENV__<NAME>`.
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("EDGE").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;

        let tables = KeyedTables::read(config_path)?;
        if let Some(redirects) = tables.redirects {
            cfg.redirects = redirects;
        }
        cfg.env = tables.env;
        cfg.env.extend(env_overrides(std::env::vars()));

        cfg.validate()?;
        Ok(cfg.normalized())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|e| ConfigError::InvalidAddress(format!("{addr}: {e}")))
    }

    /// Reject configurations the edge handler cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (path, spec) in &self.redirects {
            if !path.starts_with('/') {
                return Err(ConfigError::InvalidRedirect {
                    path: path.clone(),
                    reason: "path must start with '/'".to_string(),
                });
            }
            if let Err(e) = url::Url::parse(spec.target()) {
                return Err(ConfigError::InvalidRedirect {
                    path: path.clone(),
                    reason: format!("target is not an absolute URL: {e}"),
                });
            }
            if !REDIRECT_CODES.contains(&spec.code()) {
                return Err(ConfigError::InvalidRedirect {
                    path: path.clone(),
                    reason: format!("unsupported status code {}", spec.code()),
                });
            }
        }

        if !self.image_proxy.path_prefix.starts_with('/') {
            return Err(ConfigError::InvalidImageProxy(
                "path_prefix must start with '/'".to_string(),
            ));
        }
        if self.image_proxy.allowed_domains.iter().all(|d| d.trim().is_empty()) {
            return Err(ConfigError::InvalidImageProxy(
                "allowed_domains must list at least one domain".to_string(),
            ));
        }
        if self.image_proxy.timeout_secs == 0 {
            return Err(ConfigError::InvalidImageProxy(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.image_proxy.max_body_size == 0 {
            return Err(ConfigError::InvalidImageProxy(
                "max_body_size must be greater than zero".to_string(),
            ));
        }

        if let Some(upstream) = &self.renderer.upstream {
            url::Url::parse(upstream)
                .map_err(|e| ConfigError::InvalidRenderer(format!("{upstream}: {e}")))?;
        }

        Ok(())
    }

    /// Lowercase and trim the allow-list so host comparison is exact
    fn normalized(mut self) -> Self {
        self.image_proxy.allowed_domains = self
            .image_proxy
            .allowed_domains
            .iter()
            .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        self
    }
}
