//! Inbound request model
//!
//! The body is fully buffered before the pipeline runs, so an `EdgeRequest`
//! can be inspected by every stage and cloned without consuming a stream.

use chrono::{DateTime, Utc};
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, HOST};
use hyper::{Method, Version};
use std::net::SocketAddr;
use url::Url;

/// Immutable request handed to the edge pipeline
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    method: Method,
    url: Url,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    request_id: String,
    received_at: DateTime<Utc>,
}

impl EdgeRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
            request_id: uuid::Uuid::new_v4().to_string(),
            received_at: Utc::now(),
        }
    }

    /// Build from hyper request parts; the absolute URL is rebuilt from `Host`
    pub fn from_parts(
        parts: hyper::http::request::Parts,
        body: Bytes,
        remote_addr: Option<SocketAddr>,
    ) -> Result<Self, url::ParseError> {
        let host = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| parts.uri.authority().map(hyper::http::uri::Authority::as_str))
            .unwrap_or("localhost");
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or("/", hyper::http::uri::PathAndQuery::as_str);
        let url = Url::parse(&format!("http://{host}{path_and_query}"))?;

        let mut req = Self::new(parts.method, url);
        req.version = parts.version;
        req.headers = parts.headers;
        req.body = body;
        req.remote_addr = remote_addr;
        Ok(req)
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub const fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub const fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub const fn version(&self) -> Version {
        self.version
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub const fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// First decoded value of a query parameter; empty values count as absent
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_uses_host_header() {
        let (parts, ()) = hyper::Request::builder()
            .uri("/api/v1/image-proxy?url=https%3A%2F%2Fcdn.sanity.io%2Fa.png")
            .header("host", "edge.example.com:8080")
            .body(())
            .unwrap()
            .into_parts();

        let req = EdgeRequest::from_parts(parts, Bytes::new(), None).unwrap();
        assert_eq!(req.url().host_str(), Some("edge.example.com"));
        assert_eq!(req.url().port(), Some(8080));
        assert_eq!(req.path(), "/api/v1/image-proxy");
        assert_eq!(
            req.query_param("url").as_deref(),
            Some("https://cdn.sanity.io/a.png")
        );
    }

    #[test]
    fn test_from_parts_without_host() {
        let (parts, ()) = hyper::Request::builder()
            .uri("/docs")
            .body(())
            .unwrap()
            .into_parts();
        let req = EdgeRequest::from_parts(parts, Bytes::new(), None).unwrap();
        assert_eq!(req.url().as_str(), "http://localhost/docs");
    }

    #[test]
    fn test_query_param_first_value_and_empty() {
        let url = Url::parse("http://localhost/p?url=&url=second&other=1").unwrap();
        let req = EdgeRequest::new(Method::GET, url);
        // Empty value is treated as missing, like a falsy string
        assert_eq!(req.query_param("url"), None);
        assert_eq!(req.query_param("other").as_deref(), Some("1"));
        assert_eq!(req.query_param("absent"), None);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let url = Url::parse("http://localhost/").unwrap();
        let a = EdgeRequest::new(Method::GET, url.clone());
        let b = EdgeRequest::new(Method::GET, url);
        assert_ne!(a.request_id(), b.request_id());
    }
}
