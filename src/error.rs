//! Unified error types for shadowtraffic.
//!
//! [`ShadowTrafficError`] covers the CLI and server lifecycle, while
//! [`CaptureError`], [`DispatchError`] and [`ShadowCallError`] describe
//! the failure modes of the shadowing engine itself. Engine errors never
//! reach a client: the filter and the dispatcher log them and move on.

use std::path::PathBuf;
use std::time::Duration;

use axum::http::StatusCode;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}: {}", self.location, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ShadowTrafficError {
    #[error("No config source found.\n\n  {hint}")]
    NoConfigSource { hint: String },

    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("File already exists: {}", path.display())]
    FileExists { path: PathBuf },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),
}

/// Failure to buffer an inbound request body for shadowing.
///
/// The body stream is single-use, so once capture fails the original
/// request can no longer be handed downstream with its payload.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("request body exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Read(#[source] axum::Error),
}

impl CaptureError {
    /// Status the downstream handler would have answered with had it
    /// attempted the same body read.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Read(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Reasons a dispatch stops before or while issuing shadow calls.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no shadow configuration available")]
    NoConfig,

    #[error("unresolvable HTTP method '{method}' for {uri}")]
    UnresolvableMethod { method: String, uri: String },

    #[error("shadowing is enabled but no hosts are configured")]
    NoHosts,

    #[error("invalid shadow target '{url}': {reason}")]
    InvalidTargetUrl { url: String, reason: String },
}

/// Outcome of a single failed outbound shadow call.
#[derive(Debug, thiserror::Error)]
pub enum ShadowCallError {
    #[error("failed to build shadow request: {0}")]
    Build(#[from] http::Error),

    #[error("shadow request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("failed to drain shadow response: {0}")]
    Body(#[from] hyper::Error),

    #[error("shadow call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}
