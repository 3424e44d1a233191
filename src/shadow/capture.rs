//! Request snapshot capture.
//!
//! An inbound body can only be streamed once. [`capture`] buffers it a
//! single time, keeps a [`RequestSnapshot`] for the dispatcher, and hands
//! back an equivalent request whose body is an independent view of the
//! same bytes. How the shadow body is later reproduced depends on the
//! [`BodyKind`] chosen at capture time.

use std::sync::LazyLock;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method};
use regex::Regex;

use crate::error::CaptureError;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART_FORM_DATA: &str = "multipart/form-data";

static BOUNDARY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new("(?i)boundary=(.*)").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Raw,
    FormEncoded,
    Multipart,
}

impl BodyKind {
    #[must_use]
    pub fn classify(method: &Method, content_type: Option<&str>) -> Self {
        let content_type = content_type.map(str::to_ascii_lowercase).unwrap_or_default();
        if *method == Method::POST && content_type.starts_with(FORM_URLENCODED) {
            Self::FormEncoded
        } else if content_type.starts_with(MULTIPART_FORM_DATA) {
            Self::Multipart
        } else {
            Self::Raw
        }
    }
}

#[derive(Debug, Clone)]
pub enum CapturedBody {
    Raw(Bytes),
    /// Parameters in first-seen order, query string first.
    FormEncoded(Vec<(String, Vec<String>)>),
    /// `None` when the parts could not be parsed.
    Multipart(Option<MultipartBody>),
}

#[derive(Debug, Clone)]
pub struct MultipartBody {
    pub boundary: String,
    pub parts: Vec<CapturedPart>,
}

#[derive(Debug, Clone)]
pub struct CapturedPart {
    pub headers: HeaderMap,
    pub content: Bytes,
}

/// Immutable copy of an inbound request taken before it is handled.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: CapturedBody,
}

/// Identity of the original request, used in dispatcher diagnostics.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: String,
    pub uri: String,
}

impl RequestSnapshot {
    #[must_use]
    pub const fn is_form_encoded(&self) -> bool {
        matches!(self.body, CapturedBody::FormEncoded(_))
    }

    /// Body text sent to shadow hosts, or `None` when there is none.
    #[must_use]
    pub fn body_text(&self) -> Option<String> {
        match &self.body {
            CapturedBody::Raw(bytes) if bytes.is_empty() => None,
            CapturedBody::Raw(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            CapturedBody::FormEncoded(params) => form_body(params),
            CapturedBody::Multipart(body) => body.as_ref().map(MultipartBody::render),
        }
    }
}

fn form_body(params: &[(String, Vec<String>)]) -> Option<String> {
    if params.is_empty() {
        return None;
    }
    let body = params
        .iter()
        .map(|(key, values)| {
            let value = values
                .first()
                .filter(|v| !v.trim().is_empty())
                .map_or("", String::as_str);
            format!("{key}={value}")
        })
        .collect::<Vec<_>>()
        .join("&");
    Some(body)
}

impl MultipartBody {
    fn render(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            out.push_str("--");
            out.push_str(&self.boundary);
            out.push('\n');
            for (name, value) in &part.headers {
                out.push_str(name.as_str());
                out.push_str(": ");
                out.push_str(&String::from_utf8_lossy(value.as_bytes()));
                out.push('\n');
            }
            out.push_str(&String::from_utf8_lossy(&part.content));
            out.push('\n');
        }
        out.push_str("--");
        out.push_str(&self.boundary);
        out.push_str("--");
        out
    }
}

/// Buffer `request` once, returning its snapshot and a replayable copy.
pub async fn capture(
    request: Request,
    max_body: usize,
) -> Result<(RequestSnapshot, Request), CaptureError> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, max_body)
        .await
        .map_err(|e| classify_read_error(e, max_body))?;

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let captured = match BodyKind::classify(&parts.method, content_type.as_deref()) {
        BodyKind::Raw => CapturedBody::Raw(bytes.clone()),
        BodyKind::FormEncoded => {
            CapturedBody::FormEncoded(parse_form(parts.uri.query(), &bytes))
        }
        BodyKind::Multipart => {
            let content_type = content_type.unwrap_or_default();
            CapturedBody::Multipart(parse_multipart(&content_type, bytes.clone()).await)
        }
    };

    let snapshot = RequestSnapshot {
        method: parts.method.as_str().to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(String::from),
        headers: parts.headers.clone(),
        body: captured,
    };

    Ok((snapshot, Request::from_parts(parts, Body::from(bytes))))
}

/// Map a failed body read to the error a client should see.
pub(crate) fn classify_read_error(err: axum::Error, limit: usize) -> CaptureError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&err);
    while let Some(e) = source {
        if e.is::<http_body_util::LengthLimitError>() {
            return CaptureError::TooLarge { limit };
        }
        source = e.source();
    }
    CaptureError::Read(err)
}

fn parse_form(query: Option<&str>, body: &[u8]) -> Vec<(String, Vec<String>)> {
    let mut params: Vec<(String, Vec<String>)> = Vec::new();
    let query_pairs = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes());
    for (key, value) in query_pairs.chain(url::form_urlencoded::parse(body)) {
        match params.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value.into_owned()),
            None => params.push((key.into_owned(), vec![value.into_owned()])),
        }
    }
    params
}

async fn parse_multipart(content_type: &str, bytes: Bytes) -> Option<MultipartBody> {
    let boundary = BOUNDARY
        .as_ref()
        .and_then(|re| re.captures(content_type))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())?;

    match read_parts(content_type, bytes).await {
        Ok(parts) if parts.is_empty() => None,
        Ok(parts) => Some(MultipartBody { boundary, parts }),
        Err(e) => {
            tracing::warn!(error = %e, "unable to parse multipart request parts");
            None
        }
    }
}

async fn read_parts(
    content_type: &str,
    bytes: Bytes,
) -> Result<Vec<CapturedPart>, Box<dyn std::error::Error + Send + Sync>> {
    let request = Request::builder()
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(bytes))?;
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| e.body_text())?;

    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let headers = field.headers().clone();
        let content = field.bytes().await?;
        parts.push(CapturedPart { headers, content });
    }
    Ok(parts)
}
