//! Header handling on the original call path.
//!
//! [`build_forwarded_headers`] prepares the client's headers for the
//! upstream: hop-by-hop headers are dropped, `Host` is rewritten to the
//! upstream authority, and the usual proxy metadata is added.

use std::sync::LazyLock;

use axum::http::header::{CONTENT_LENGTH, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

const VIA: &str = "1.1 shadowtraffic";

/// Strip hop-by-hop headers and `content-length` from an upstream response
/// whose body has already been collected.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(CONTENT_LENGTH);
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    client_ip: &str,
    upstream: &url::Url,
    correlation_id: &str,
) -> HeaderMap {
    let mut headers = original.clone();
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }

    if let Some(host) = upstream.host_str() {
        let authority = upstream
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
        set(&mut headers, "host", &authority);
    }

    let forwarded_for = original
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || client_ip.to_string(),
            |chain| format!("{chain}, {client_ip}"),
        );
    let real_ip = forwarded_for
        .split(',')
        .next()
        .map_or(client_ip, str::trim)
        .to_string();
    set(&mut headers, "x-forwarded-for", &forwarded_for);
    set(&mut headers, "x-real-ip", &real_ip);
    set(&mut headers, "x-forwarded-proto", upstream.scheme());
    if let Some(original_host) = original.get(HOST) {
        headers.insert("x-forwarded-host", original_host.clone());
    }
    set(&mut headers, "via", VIA);
    set(&mut headers, "x-correlation-id", correlation_id);

    headers
}

fn set(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(_) => tracing::debug!(header = name, "skipping unrepresentable header value"),
    }
}
