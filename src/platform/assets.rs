//! Static asset store
//!
//! Answers with a response for every request: 404 means "not here", any
//! other status is a real answer. I/O errors other than not-found are
//! returned as `AssetError` instead of a response. The root is resolved once
//! when the store is built; a root that does not exist serves nothing.

use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use hyper::{Method, Response, StatusCode};
use percent_encoding::percent_decode_str;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::http::{self, cache, EdgeRequest, EdgeResponse};
use crate::logger;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read asset '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn fetch(&self, req: &EdgeRequest) -> Result<EdgeResponse, AssetError>;
}

/// Serves files below a root directory
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    /// Canonical root, `None` when it could not be resolved at startup
    root: Option<PathBuf>,
    index_files: Vec<String>,
}

impl FsAssetStore {
    pub fn new(root: impl AsRef<Path>, index_files: Vec<String>) -> Self {
        let root = root.as_ref();
        let canonical = match std::fs::canonicalize(root) {
            Ok(path) => Some(path),
            Err(e) => {
                logger::log_warning(&format!(
                    "Asset root '{}' is not accessible, serving no assets: {e}",
                    root.display()
                ));
                None
            }
        };
        Self {
            root: canonical,
            index_files,
        }
    }

    /// Map a URL path to a file inside the root, `None` when there is none
    async fn resolve(&self, url_path: &str) -> Result<Option<PathBuf>, AssetError> {
        let Some(root) = &self.root else {
            return Ok(None);
        };
        let Ok(decoded) = percent_decode_str(url_path).decode_utf8() else {
            return Ok(None);
        };
        let relative = decoded.trim_start_matches('/');

        let mut file_path = root.join(relative);
        if relative.is_empty() || relative.ends_with('/') || is_dir(&file_path).await {
            for index_file in &self.index_files {
                let index_path = file_path.join(index_file);
                if is_file(&index_path).await {
                    file_path = index_path;
                    break;
                }
            }
        }

        // File not found is common (404), no need to log
        let canonical = match fs::canonicalize(&file_path).await {
            Ok(p) => p,
            Err(e) if is_missing(&e) => return Ok(None),
            Err(source) => {
                return Err(AssetError::Io {
                    path: file_path.display().to_string(),
                    source,
                })
            }
        };
        if !canonical.starts_with(root) {
            logger::log_warning(&format!(
                "Path traversal attempt blocked: {} -> {}",
                url_path,
                canonical.display()
            ));
            return Ok(None);
        }
        if !is_file(&canonical).await {
            return Ok(None);
        }
        Ok(Some(canonical))
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn fetch(&self, req: &EdgeRequest) -> Result<EdgeResponse, AssetError> {
        let is_head = match *req.method() {
            Method::GET => false,
            Method::HEAD => true,
            _ => return Ok(http::build_404_response()),
        };

        let Some(path) = self.resolve(req.path()).await? else {
            return Ok(http::build_404_response());
        };

        let content = match fs::read(&path).await {
            Ok(c) => c,
            Err(e) if is_missing(&e) => return Ok(http::build_404_response()),
            Err(source) => {
                return Err(AssetError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        let content_type = mime_guess::from_path(&path).first_or_octet_stream();
        Ok(build_file_response(
            content,
            content_type.essence_str(),
            req.header_str(IF_NONE_MATCH.as_str()),
            is_head,
        ))
    }
}

fn is_missing(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

/// Build file response with `ETag` revalidation
fn build_file_response(
    data: Vec<u8>,
    content_type: &str,
    if_none_match: Option<&str>,
    is_head: bool,
) -> EdgeResponse {
    let etag = cache::generate_etag(&data);

    if cache::check_etag_match(if_none_match, &etag) {
        return Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(ETAG, &etag)
            .body(Full::new(Bytes::new()))
            .unwrap_or_else(|e| {
                logger::log_error(&format!("Failed to build 304 response: {e}"));
                Response::new(Full::new(Bytes::new()))
            });
    }

    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { Bytes::from(data) };

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, content_length)
        .header(ETAG, &etag)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build asset response: {e}"));
            Response::new(Full::new(Bytes::new()))
        })
}
