//! Optional Sentry error tracking.
//!
//! Events are tagged with the same origin identity that shadow requests
//! carry in `shadow-traffic-from`, so a failure seen on a shadow host can
//! be traced back to the instance that mirrored it.

use std::borrow::Cow;

pub fn init(dsn: &str, environment: Option<&str>, origin: &str) -> sentry::ClientInitGuard {
    sentry::init(client_options(dsn, environment, origin))
}

fn client_options(dsn: &str, environment: Option<&str>, origin: &str) -> sentry::ClientOptions {
    let dsn = dsn
        .parse()
        .map_err(|e| tracing::warn!(error = %e, "invalid Sentry DSN, error tracking disabled"))
        .ok();

    sentry::ClientOptions {
        dsn,
        environment: environment.map(|e| Cow::Owned(e.to_string())),
        release: Some(Cow::Borrowed(concat!("shadowtraffic@", env!("CARGO_PKG_VERSION")))),
        server_name: Some(Cow::Owned(origin.to_string())),
        ..Default::default()
    }
}
