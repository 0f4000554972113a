// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub image_proxy: ImageProxyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    /// Exact path -> redirect target, read case-preserved from the file
    #[serde(skip_deserializing, default = "default_redirects")]
    pub redirects: HashMap<String, RedirectSpec>,
    /// Values handed to the application renderer untouched
    #[serde(skip_deserializing)]
    pub env: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            performance: PerformanceConfig::default(),
            http: HttpConfig::default(),
            assets: AssetsConfig::default(),
            image_proxy: ImageProxyConfig::default(),
            cache: CacheConfig::default(),
            renderer: RendererConfig::default(),
            redirects: default_redirects(),
            env: HashMap::new(),
        }
    }
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    /// Subscriber output: `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: default_log_format(),
            access_log: true,
            access_log_format: default_access_log_format(),
        }
    }
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    #[serde(default = "default_true")]
    pub keep_alive: bool,
    /// Seconds a connection may stay open before it is dropped
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    #[serde(default)]
    pub max_connections: Option<u64>,
    /// Seconds to wait for pending background tasks at shutdown
    #[serde(default = "default_shutdown_grace_period")]
    pub shutdown_grace_period: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            keep_alive: true,
            read_timeout: default_read_timeout(),
            max_connections: None,
            shutdown_grace_period: default_shutdown_grace_period(),
        }
    }
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_max_body_size")]
    pub max_body_size: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_body_size: default_max_body_size(),
        }
    }
}

/// Static asset store configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AssetsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_assets_root")]
    pub root: String,
    /// Paths under this prefix are fingerprinted and cached for a year
    #[serde(default = "default_assets_prefix")]
    pub assets_prefix: String,
    #[serde(default = "default_index_files")]
    pub index_files: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: default_assets_root(),
            assets_prefix: default_assets_prefix(),
            index_files: default_index_files(),
        }
    }
}

/// Image proxy configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ImageProxyConfig {
    #[serde(default = "default_proxy_prefix")]
    pub path_prefix: String,
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,
    #[serde(default = "default_proxy_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Largest upstream image body accepted, in bytes
    #[serde(default = "default_image_body_size")]
    pub max_body_size: usize,
}

impl Default for ImageProxyConfig {
    fn default() -> Self {
        Self {
            path_prefix: default_proxy_prefix(),
            allowed_domains: default_allowed_domains(),
            timeout_secs: default_proxy_timeout(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
            max_body_size: default_image_body_size(),
        }
    }
}

/// Edge cache configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
    /// Upper bound on the summed size of stored bodies
    #[serde(default = "default_cache_bytes")]
    pub max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
            max_bytes: default_cache_bytes(),
        }
    }
}

/// Application renderer configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RendererConfig {
    /// Base URL of the application server; 404 for everything when unset
    #[serde(default)]
    pub upstream: Option<String>,
    #[serde(default = "default_renderer_timeout")]
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            upstream: None,
            timeout_secs: default_renderer_timeout(),
        }
    }
}

/// Redirect entry: either a bare target or a table with an explicit code
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum RedirectSpec {
    Target(String),
    Rule {
        target: String,
        #[serde(default = "default_redirect_code")]
        code: u16,
    },
}

impl RedirectSpec {
    pub fn target(&self) -> &str {
        match self {
            Self::Target(target) | Self::Rule { target, .. } => target,
        }
    }

    pub const fn code(&self) -> u16 {
        match self {
            Self::Target(_) => 302,
            Self::Rule { code, .. } => *code,
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_access_log_format() -> String {
    "combined".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_read_timeout() -> u64 {
    30
}

#[allow(clippy::missing_const_for_fn)]
fn default_shutdown_grace_period() -> u64 {
    15
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_body_size() -> u64 {
    10_485_760 // 10MB
}

fn default_assets_root() -> String {
    "public".to_string()
}

fn default_assets_prefix() -> String {
    "/assets/".to_string()
}

fn default_index_files() -> Vec<String> {
    vec!["index.html".to_string(), "index.htm".to_string()]
}

fn default_proxy_prefix() -> String {
    "/api/v1/image-proxy".to_string()
}

fn default_allowed_domains() -> Vec<String> {
    vec!["cdn.sanity.io".to_string(), "sanity.io".to_string()]
}

#[allow(clippy::missing_const_for_fn)]
fn default_proxy_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    "EdgeRouter-ImageProxy/1.0".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_redirects() -> usize {
    5
}

#[allow(clippy::missing_const_for_fn)]
fn default_image_body_size() -> usize {
    10 * 1024 * 1024
}

#[allow(clippy::missing_const_for_fn)]
fn default_cache_entries() -> usize {
    1024
}

#[allow(clippy::missing_const_for_fn)]
fn default_cache_bytes() -> usize {
    64 * 1024 * 1024
}

#[allow(clippy::missing_const_for_fn)]
fn default_renderer_timeout() -> u64 {
    30
}

#[allow(clippy::missing_const_for_fn)]
fn default_redirect_code() -> u16 {
    302
}

pub(super) fn default_redirects() -> HashMap<String, RedirectSpec> {
    HashMap::from([(
        "/docs".to_string(),
        RedirectSpec::Target("https://developers.cloudflare.com/workers".to_string()),
    )])
}
