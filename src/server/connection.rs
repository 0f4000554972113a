// Connection handling module
// Accepts a single TCP connection and serves it with the edge pipeline

use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::task::TaskTracker;
use tracing::{debug, Instrument};

use crate::config::AppState;
use crate::http::{self, EdgeRequest, EdgeResponse, X_REQUEST_ID};
use crate::logger::{self, AccessLogEntry};

/// Accept and process a connection, checking limits and logging.
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
    connections: &TaskTracker,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);

    if let Err(e) = stream.set_nodelay(true) {
        debug!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
    }

    connections.spawn(handle_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(conn_counter),
    ));
}

/// Serve one connection until it closes, `read_timeout` elapses or shutdown
///
/// On shutdown the connection finishes its in-flight request and is then
/// closed; an idle keep-alive connection closes immediately.
async fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
) {
    let io = TokioIo::new(stream);
    let timeout_duration = Duration::from_secs(state.config.performance.read_timeout);

    let mut builder = http1::Builder::new();
    builder.keep_alive(state.config.performance.keep_alive);

    let service_state = Arc::clone(&state);
    let conn = builder.serve_connection(
        io,
        service_fn(move |req| serve_request(req, Arc::clone(&service_state), peer_addr)),
    );
    tokio::pin!(conn);

    let deadline = tokio::time::sleep(timeout_duration);
    tokio::pin!(deadline);
    let mut draining = false;

    let result = loop {
        tokio::select! {
            res = conn.as_mut() => break Some(res),
            () = state.shutdown.cancelled(), if !draining => {
                debug!(peer = %peer_addr, "Draining connection for shutdown");
                conn.as_mut().graceful_shutdown();
                draining = true;
            }
            () = deadline.as_mut() => break None,
        }
    };

    match result {
        Some(Ok(())) => {}
        Some(Err(err)) => logger::log_connection_error(&err),
        None => {
            debug!(
                peer = %peer_addr,
                timeout_secs = timeout_duration.as_secs(),
                "Connection timed out"
            );
        }
    }

    conn_counter.fetch_sub(1, Ordering::SeqCst);
}

/// Buffer the body, run the pipeline and write the access log line
async fn serve_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<EdgeResponse, Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();

    let limit = usize::try_from(state.config.http.max_body_size).unwrap_or(usize::MAX);
    let body = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() => {
            logger::log_warning(&format!(
                "Request body too large from {peer_addr} (max: {limit} bytes)"
            ));
            return Ok(http::build_413_response());
        }
        Err(e) => {
            debug!(peer = %peer_addr, error = %e, "Failed to read request body");
            return Ok(http::build_text_response(StatusCode::BAD_REQUEST, "Bad Request"));
        }
    };

    let edge_req = match EdgeRequest::from_parts(parts, body, Some(peer_addr)) {
        Ok(r) => r,
        Err(e) => {
            debug!(peer = %peer_addr, error = %e, "Unroutable request target");
            return Ok(http::build_text_response(StatusCode::BAD_REQUEST, "Bad Request"));
        }
    };

    let span = tracing::info_span!(
        "request",
        request_id = edge_req.request_id(),
        method = %edge_req.method(),
        path = edge_req.path(),
    );
    let mut resp = state.handler.handle(&edge_req).instrument(span).await;

    if let Ok(id) = HeaderValue::from_str(edge_req.request_id()) {
        resp.headers_mut().insert(X_REQUEST_ID, id);
    }

    if state.access_log_enabled() {
        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        let entry = AccessLogEntry::from_exchange(&edge_req, &resp, elapsed_us);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(resp)
}
