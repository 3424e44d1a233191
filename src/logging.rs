//! Structured logging setup and per-task logging context.
//!
//! [`init`] configures a `tracing-subscriber` with either JSON output (for
//! production) or pretty-printed output (for TTY / local dev). Format is
//! auto-detected from the terminal but can be forced via `--json` or
//! `--pretty`.
//!
//! [`LogContext`] carries request-scoped key/value pairs (correlation id,
//! method, path) across task boundaries. It lives in a tokio task-local, so
//! it is visible only inside [`LogContext::scope`] and never leaks between
//! unrelated tasks.

use std::collections::BTreeMap;
use std::future::Future;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::LogLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty || std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

pub fn init(level: &LogLevel, format: LogFormat) {
    let filter = tracing_subscriber::filter::Targets::new().with_default(level.to_tracing_level());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

tokio::task_local! {
    static CONTEXT: LogContext;
}

/// Ordered string map of diagnostic fields for the current task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    fields: BTreeMap<String, String>,
}

impl LogContext {
    /// Copy of the calling task's context, empty outside any scope.
    #[must_use]
    pub fn current() -> Self {
        CONTEXT.try_with(Clone::clone).unwrap_or_default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Run `fut` with this context installed; the previous one is restored
    /// when it completes.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CONTEXT.scope(self, fut).await
    }
}
