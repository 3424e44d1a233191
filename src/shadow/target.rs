//! Shadow target URL construction.

use url::Url;

use crate::error::DispatchError;

const HTTPS: &str = "https://";
const HTTP: &str = "http://";

/// Build the URL a request is replayed against on `host`.
///
/// Hosts without a scheme are reached over HTTPS. The combined URL is
/// percent-decoded once before parsing so that an already-encoded query
/// is not encoded a second time.
pub fn build_target_url(host: &str, path: &str, query: Option<&str>) -> Result<Url, DispatchError> {
    let host = host.trim().trim_end_matches('/');
    let mut raw = if host.starts_with(HTTPS) || host.starts_with(HTTP) {
        host.to_string()
    } else {
        format!("{HTTPS}{host}")
    };
    raw.push_str(path);
    if let Some(query) = query.filter(|q| !q.trim().is_empty()) {
        raw.push('?');
        raw.push_str(query);
    }

    let decoded = urlencoding::decode(&raw).map_err(|e| DispatchError::InvalidTargetUrl {
        url: raw.clone(),
        reason: e.to_string(),
    })?;

    Url::parse(&decoded).map_err(|e| DispatchError::InvalidTargetUrl {
        url: decoded.into_owned(),
        reason: e.to_string(),
    })
}
