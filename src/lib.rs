//! Edge request router
//!
//! Every request runs through an ordered pipeline: static redirects, the
//! asset store, an SSRF-guarded image proxy with a cache-aside edge cache,
//! and finally the application renderer.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod platform;
pub mod routing;
pub mod server;
