//! Image proxy failures
//!
//! `Display` is the exact body sent to the client; anything carried inside a
//! variant is for logs only.

use hyper::StatusCode;
use thiserror::Error;

use crate::http::{self, EdgeResponse};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Missing url parameter")]
    MissingParameter,

    #[error("Invalid URL")]
    MalformedUrl(#[source] url::ParseError),

    #[error("Only HTTPS URLs are allowed")]
    DisallowedScheme(String),

    #[error("URL not allowed")]
    DisallowedDomain(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Upstream error: {}", .0.as_u16())]
    UpstreamNonSuccess(StatusCode),

    #[error("Upstream response too large")]
    TooLarge(usize),

    #[error("Invalid content type - only images are allowed")]
    InvalidContentType(Option<String>),

    #[error("Proxy error")]
    Unknown(String),
}

impl ProxyError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameter | Self::MalformedUrl(_) | Self::InvalidContentType(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::DisallowedScheme(_) | Self::DisallowedDomain(_) => StatusCode::FORBIDDEN,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::TooLarge(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamNonSuccess(status) => *status,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> EdgeResponse {
        http::build_text_response(self.status(), self.to_string())
    }

    /// Internal detail worth logging, never sent to the client
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::MalformedUrl(e) => Some(e.to_string()),
            Self::DisallowedScheme(scheme) => Some(format!("scheme={scheme}")),
            Self::DisallowedDomain(host) => Some(format!("host={host}")),
            Self::InvalidContentType(ct) => Some(format!(
                "content_type={}",
                ct.as_deref().unwrap_or("<none>")
            )),
            Self::TooLarge(limit) => Some(format!("limit={limit}")),
            Self::Unknown(detail) => Some(detail.clone()),
            Self::MissingParameter | Self::Timeout | Self::UpstreamNonSuccess(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ProxyError::MissingParameter, 400),
            (
                ProxyError::MalformedUrl(url::ParseError::RelativeUrlWithoutBase),
                400,
            ),
            (ProxyError::DisallowedScheme("http".to_string()), 403),
            (ProxyError::DisallowedDomain("evil.example.com".to_string()), 403),
            (ProxyError::Timeout, 504),
            (ProxyError::TooLarge(1024), 502),
            (ProxyError::UpstreamNonSuccess(StatusCode::NOT_FOUND), 404),
            (ProxyError::InvalidContentType(Some("text/html".to_string())), 400),
            (ProxyError::Unknown("boom".to_string()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.status().as_u16(), status, "{err:?}");
        }
    }

    #[test]
    fn test_bodies_hide_internal_detail() {
        let err = ProxyError::Unknown("connection reset by 10.0.0.3:443".to_string());
        assert_eq!(err.to_string(), "Proxy error");
        assert_eq!(
            ProxyError::UpstreamNonSuccess(StatusCode::BAD_GATEWAY).to_string(),
            "Upstream error: 502"
        );
        assert_eq!(
            ProxyError::DisallowedDomain("evil.example.com".to_string()).to_string(),
            "URL not allowed"
        );
    }
}
