//! Header composition for outbound shadow requests.
//!
//! Every shadow request carries the shadow marker (so the next hop never
//! shadows it again) and the identity of the dispatching host. Original
//! request headers are only copied when listed in `forwardHeaders`, and
//! custom headers are namespaced under [`CUSTOM_HEADER_PREFIX`].

use std::collections::BTreeMap;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const SHADOW_MARKER_KEY: &str = "is-shadow-traffic";
pub const SHADOW_MARKER_VALUE: &str = "true";
pub const SHADOW_ORIGIN_KEY: &str = "shadow-traffic-from";
pub const CUSTOM_HEADER_PREFIX: &str = "shadow-traffic-";

const JSON: &str = "application/json";
const JSON_UTF8: &str = "application/json;charset=UTF-8";

const FALLBACK_ORIGIN: &str = "localhost";

#[must_use]
pub fn compose_headers(
    original: &HeaderMap,
    custom: &BTreeMap<String, String>,
    forward: &[String],
    origin: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if !forward.is_empty() {
        for (name, value) in original {
            if forward
                .iter()
                .any(|f| f.trim().eq_ignore_ascii_case(name.as_str()))
            {
                headers.append(name.clone(), value.clone());
            }
        }
    }

    headers.insert(
        HeaderName::from_static(SHADOW_MARKER_KEY),
        HeaderValue::from_static(SHADOW_MARKER_VALUE),
    );
    match HeaderValue::from_str(origin) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(SHADOW_ORIGIN_KEY), value);
        }
        Err(_) => {
            tracing::warn!(origin, "origin is not a valid header value, using fallback");
            headers.insert(
                HeaderName::from_static(SHADOW_ORIGIN_KEY),
                HeaderValue::from_static(FALLBACK_ORIGIN),
            );
        }
    }

    let plain_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(JSON));
    if plain_json {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
    }

    for (key, value) in custom {
        let name = format!("{CUSTOM_HEADER_PREFIX}{key}");
        match (name.parse::<HeaderName>(), HeaderValue::from_str(value)) {
            (Ok(name), Ok(val)) => {
                headers.append(name, val);
            }
            _ => {
                tracing::warn!(header = %name, "invalid custom header name or value, skipping");
            }
        }
    }

    headers
}

/// Identity sent in the shadow-origin header, resolved once at startup.
#[must_use]
pub fn resolve_origin(configured: Option<&str>) -> String {
    if let Some(origin) = configured.map(str::trim).filter(|o| !o.is_empty()) {
        return origin.to_string();
    }
    match hostname::get() {
        Ok(name) => name
            .into_string()
            .ok()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| FALLBACK_ORIGIN.to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "could not resolve local host name");
            FALLBACK_ORIGIN.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn custom_headers_only_add_marker_and_origin() {
        let mut original = HeaderMap::new();
        original.insert("authorization", "Bearer x".parse().unwrap());

        let headers = compose_headers(&original, &custom(&[("carlson", "tse")]), &[], "box-1");

        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get(SHADOW_MARKER_KEY).unwrap(), "true");
        assert_eq!(headers.get(SHADOW_ORIGIN_KEY).unwrap(), "box-1");
        assert_eq!(headers.get("shadow-traffic-carlson").unwrap(), "tse");
    }

    #[test]
    fn forward_headers_match_case_insensitively() {
        let mut original = HeaderMap::new();
        original.insert("authorization", "Bearer x".parse().unwrap());
        original.insert("x-trace", "abc".parse().unwrap());

        let headers = compose_headers(
            &original,
            &BTreeMap::new(),
            &["Authorization".into()],
            "box-1",
        );

        assert_eq!(headers.get("authorization").unwrap(), "Bearer x");
        assert!(headers.get("x-trace").is_none());
    }

    #[test]
    fn plain_json_gains_charset() {
        let mut original = HeaderMap::new();
        original.insert(CONTENT_TYPE, "application/json".parse().unwrap());

        let headers = compose_headers(&original, &BTreeMap::new(), &["content-type".into()], "h");

        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), JSON_UTF8);
    }

    #[test]
    fn other_content_types_pass_through() {
        for ct in ["text/plain", "application/json; charset=ISO-8859-1", "application/xml"] {
            let mut original = HeaderMap::new();
            original.insert(CONTENT_TYPE, ct.parse().unwrap());

            let headers =
                compose_headers(&original, &BTreeMap::new(), &["content-type".into()], "h");

            assert_eq!(headers.get(CONTENT_TYPE).unwrap(), ct);
        }
    }

    #[test]
    fn forwarded_marker_is_replaced_not_duplicated() {
        let mut original = HeaderMap::new();
        original.insert(SHADOW_MARKER_KEY, "false".parse().unwrap());

        let headers = compose_headers(
            &original,
            &BTreeMap::new(),
            &[SHADOW_MARKER_KEY.into()],
            "h",
        );

        let values: Vec<_> = headers.get_all(SHADOW_MARKER_KEY).iter().collect();
        assert_eq!(values, vec!["true"]);
    }

    #[test]
    fn invalid_custom_header_is_skipped() {
        let headers = compose_headers(
            &HeaderMap::new(),
            &custom(&[("bad key", "v"), ("team", "search")]),
            &[],
            "h",
        );
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("shadow-traffic-team").unwrap(), "search");
    }

    #[test]
    fn configured_origin_wins() {
        assert_eq!(resolve_origin(Some(" edge-7 ")), "edge-7");
        assert!(!resolve_origin(None).is_empty());
    }
}
