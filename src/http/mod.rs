//! HTTP protocol layer module
//!
//! Request model, response builders and cache-control helpers shared by the
//! pipeline stages and the platform collaborators.

pub mod cache;
pub mod request;
pub mod response;

use hyper::header::{HeaderMap, HeaderName};

pub use request::EdgeRequest;
pub use response::{
    build_404_response, build_413_response, build_500_response, build_bytes_response,
    build_redirect_response, build_text_response, EdgeResponse,
};

/// Marker header set by the image proxy
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Connection-scoped headers that must not be forwarded between hops
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Drop hop-by-hop headers and the length header (bodies are re-framed)
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove(hyper::header::CONTENT_LENGTH);
}
