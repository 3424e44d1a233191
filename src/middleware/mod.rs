//! Request middleware.
//!
//! [`shadow_filter`] wraps every proxied request: it tags the request with
//! a correlation id, asks the inclusion policy whether to mirror it, and
//! if so captures the body and submits a dispatch before letting the
//! original request continue untouched.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::Instrument;

use crate::logging::LogContext;
use crate::server::AppState;
use crate::shadow::{capture, RequestMeta};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

pub async fn shadow_filter(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let correlation_id = correlation_id(&mut request);
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let context = LogContext::current()
        .with("correlation_id", correlation_id.clone())
        .with("method", method.as_str())
        .with("path", path.clone());
    let span = tracing::info_span!(
        "request",
        correlation_id = %correlation_id,
        method = %method,
        path = %path
    );

    context
        .scope(filter(state, request, next, method, path).instrument(span))
        .await
}

async fn filter(
    state: Arc<AppState>,
    request: Request,
    next: Next,
    method: Method,
    path: String,
) -> Response {
    let policy = state.config.policy().await;

    if !policy.should_shadow(&method, &path, request.headers()) {
        return next.run(request).await;
    }

    let meta = RequestMeta {
        method: method.to_string(),
        uri: request.uri().to_string(),
    };

    match capture::capture(request, state.max_body).await {
        Ok((snapshot, request)) => {
            state.dispatcher.submit(snapshot, meta);
            next.run(request).await
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to capture request for shadowing");
            e.status().into_response()
        }
    }
}

/// Reuse the caller's correlation id, or mint one and attach it so the
/// forwarder sees the same value.
fn correlation_id(request: &mut Request) -> String {
    if let Some(id) = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return id.to_string();
    }

    let id = uuid::Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&id) {
        request.headers_mut().insert(CORRELATION_HEADER, value);
    }
    id
}
