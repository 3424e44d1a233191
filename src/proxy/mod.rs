//! The original call path.
//!
//! [`forward_handler`] is the Axum fallback behind the shadow filter. It
//! relays each request to the configured upstream and returns that
//! response unchanged apart from hop-by-hop headers. Without an upstream
//! it answers `404`.

pub mod headers;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use http_body_util::{BodyExt, Full};

use crate::config::ConfigAccessor;
use crate::middleware::CORRELATION_HEADER;
use crate::server::AppState;
use crate::shadow::capture::classify_read_error;

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
    body: Body,
) -> Response {
    let correlation_id = req_headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    let upstream = state
        .config
        .current()
        .await
        .and_then(|config| config.upstream.clone());
    let Some(upstream) = upstream else {
        tracing::debug!(path = %uri.path(), "no upstream configured");
        return StatusCode::NOT_FOUND.into_response();
    };

    let target = match upstream_url(&upstream.url, &uri) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(upstream = %upstream.url, error = %e, "invalid upstream URL");
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let body = match axum::body::to_bytes(body, state.max_body).await {
        Ok(bytes) => bytes,
        Err(e) => return classify_read_error(e, state.max_body).status().into_response(),
    };

    let headers = headers::build_forwarded_headers(
        &req_headers,
        &addr.ip().to_string(),
        &target,
        &correlation_id,
    );
    let mut builder = hyper::Request::builder()
        .method(method.clone())
        .uri(target.as_str());
    for (key, value) in &headers {
        builder = builder.header(key, value);
    }
    let request = match builder.body(Full::new(body)) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "failed to build upstream request");
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let timeout = Duration::from_millis(upstream.timeout);
    let exchange = async {
        let response = state.http_client.request(request).await?;
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await?.to_bytes();
        Ok::<_, Box<dyn std::error::Error + Send + Sync>>((parts, bytes))
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(Ok((mut parts, bytes))) => {
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                method = %method,
                upstream = %target,
                status = parts.status.as_u16(),
                "request forwarded"
            );
            headers::strip_response_hop_by_hop(&mut parts.headers);
            if let Ok(value) = correlation_id.parse() {
                parts.headers.insert(CORRELATION_HEADER, value);
            }
            Response::from_parts(parts, Body::from(bytes))
        }
        Ok(Err(e)) => {
            tracing::warn!(upstream = %target, error = %e, "upstream request failed");
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            StatusCode::BAD_GATEWAY.into_response()
        }
        Err(_) => {
            tracing::warn!(upstream = %target, timeout_ms = upstream.timeout, "upstream timed out");
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
    }
}

fn upstream_url(base: &str, uri: &Uri) -> Result<url::Url, url::ParseError> {
    let mut raw = format!("{}{}", base.trim_end_matches('/'), uri.path());
    if let Some(query) = uri.query() {
        raw.push('?');
        raw.push_str(query);
    }
    url::Url::parse(&raw)
}
