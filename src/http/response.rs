//! HTTP response building module
//!
//! Builders for the fixed responses the edge emits itself.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use hyper::{Response, StatusCode};

use super::cache::CachePolicy;

/// Every response the edge produces carries a buffered body
pub type EdgeResponse = Response<Full<Bytes>>;

/// Build a redirect to an absolute target
pub fn build_redirect_response(target: &str, code: u16) -> EdgeResponse {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::FOUND);
    Response::builder()
        .status(status)
        .header(LOCATION, target)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build a short plain-text response that must not be cached
pub fn build_text_response(status: StatusCode, body: impl Into<String>) -> EdgeResponse {
    let body = Bytes::from(body.into());
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(CACHE_CONTROL, CachePolicy::NoStore.to_header_value())
        .body(Full::new(body.clone()))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(body))
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> EdgeResponse {
    build_text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> EdgeResponse {
    build_text_response(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload Too Large")
}

/// Build generic 500 response
pub fn build_500_response() -> EdgeResponse {
    build_text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

/// Build a response from already-buffered parts
pub fn build_bytes_response(status: StatusCode, headers: HeaderMap, body: Bytes) -> EdgeResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_text_response() {
        let resp = build_text_response(StatusCode::FORBIDDEN, "URL not allowed");
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(resp.headers()[CACHE_CONTROL], "no-store");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"URL not allowed");
    }

    #[test]
    fn test_redirect_response() {
        let resp = build_redirect_response("https://developers.cloudflare.com/workers", 302);
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers()[LOCATION],
            "https://developers.cloudflare.com/workers"
        );

        let resp = build_redirect_response("https://example.com", 301);
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
    }
}
