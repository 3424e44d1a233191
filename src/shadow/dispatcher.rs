//! Asynchronous shadow dispatch.
//!
//! [`ShadowDispatcher::submit`] hands a captured request to the dispatch
//! pool and returns at once. The dispatch task samples, rebuilds the
//! request once per configured host and fires the copies on the HTTP pool.
//! It then waits for those calls off the request path and discards their
//! results. Every failure is logged here and goes no further.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::Method;
use serde::Serialize;

use crate::config::ConfigAccessor;
use crate::error::DispatchError;
use crate::pool::WorkerPool;

use super::capture::{RequestMeta, RequestSnapshot};
use super::client::{ShadowClient, ShadowRequest};
use super::headers::compose_headers;
use super::sampler::{admits, RandomSampler, Sampler};
use super::target::build_target_url;

#[derive(Debug, Default)]
pub struct ShadowStats {
    pub submitted: AtomicU64,
    pub not_sampled: AtomicU64,
    pub sent: AtomicU64,
    pub failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ShadowStatsSnapshot {
    pub dispatches_submitted: u64,
    pub dispatches_not_sampled: u64,
    pub shadow_calls_sent: u64,
    pub shadow_calls_failed: u64,
}

impl ShadowStats {
    #[must_use]
    pub fn snapshot(&self) -> ShadowStatsSnapshot {
        ShadowStatsSnapshot {
            dispatches_submitted: self.submitted.load(Ordering::Relaxed),
            dispatches_not_sampled: self.not_sampled.load(Ordering::Relaxed),
            shadow_calls_sent: self.sent.load(Ordering::Relaxed),
            shadow_calls_failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// How a dispatch that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    NotSampled,
    Sent { calls: usize, failed: usize },
}

pub struct ShadowDispatcher {
    config: Arc<dyn ConfigAccessor>,
    client: Arc<dyn ShadowClient>,
    sampler: Arc<dyn Sampler>,
    dispatch_pool: WorkerPool,
    http_pool: WorkerPool,
    origin: String,
    stats: ShadowStats,
}

impl ShadowDispatcher {
    #[must_use]
    pub fn new(
        config: Arc<dyn ConfigAccessor>,
        client: Arc<dyn ShadowClient>,
        dispatch_pool: WorkerPool,
        http_pool: WorkerPool,
        origin: String,
    ) -> Self {
        Self {
            config,
            client,
            sampler: Arc::new(RandomSampler),
            dispatch_pool,
            http_pool,
            origin,
            stats: ShadowStats::default(),
        }
    }

    #[must_use]
    pub fn with_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    #[must_use]
    pub const fn stats(&self) -> &ShadowStats {
        &self.stats
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Queue a dispatch on the dispatch pool without waiting for it.
    pub fn submit(self: &Arc<Self>, snapshot: RequestSnapshot, meta: RequestMeta) {
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        let this = Arc::clone(self);
        let handle = self
            .dispatch_pool
            .spawn(async move { this.dispatch(snapshot, meta).await });
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "shadow dispatch task aborted");
            }
        });
    }

    /// Run one dispatch to completion. Never fails; errors are logged.
    pub async fn dispatch(&self, snapshot: RequestSnapshot, meta: RequestMeta) {
        match self.try_dispatch(&snapshot, &meta).await {
            Ok(DispatchOutcome::NotSampled) => {
                self.stats.not_sampled.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(uri = %meta.uri, "request not sampled for shadowing");
            }
            Ok(DispatchOutcome::Sent { calls, failed }) => {
                tracing::debug!(uri = %meta.uri, calls, failed, "shadow dispatch complete");
            }
            Err(
                e @ (DispatchError::NoConfig
                | DispatchError::NoHosts
                | DispatchError::UnresolvableMethod { .. }),
            ) => {
                tracing::error!(
                    error = %e,
                    method = %meta.method,
                    uri = %meta.uri,
                    "shadow traffic not sent"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, uri = %meta.uri, "invoking shadow traffic failed");
            }
        }
    }

    pub async fn try_dispatch(
        &self,
        snapshot: &RequestSnapshot,
        meta: &RequestMeta,
    ) -> Result<DispatchOutcome, DispatchError> {
        let config = self.config.current().await.ok_or(DispatchError::NoConfig)?;
        let shadow = &config.shadow;

        if !admits(self.sampler.draw(), shadow.percentage) {
            return Ok(DispatchOutcome::NotSampled);
        }

        let method = resolve_method(&snapshot.method).ok_or_else(|| {
            DispatchError::UnresolvableMethod {
                method: meta.method.clone(),
                uri: meta.uri.clone(),
            }
        })?;

        if shadow.hosts.is_empty() {
            return Err(DispatchError::NoHosts);
        }

        let query = if snapshot.is_form_encoded() {
            None
        } else {
            snapshot.query.as_deref()
        };
        let body = snapshot.body_text();
        let headers = compose_headers(
            &snapshot.headers,
            &shadow.custom_headers,
            &shadow.forward_headers,
            &self.origin,
        );

        let mut calls = Vec::with_capacity(shadow.hosts.len());
        for host in &shadow.hosts {
            if host.trim().is_empty() {
                tracing::warn!("shadow traffic is enabled but a blank host is configured");
                continue;
            }

            let url = match build_target_url(host, &snapshot.path, query) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "skipping shadow host");
                    continue;
                }
            };

            tracing::info!(url = %url, host = %host, "forwarding shadow traffic");
            let request = ShadowRequest {
                method: method.clone(),
                url,
                headers: headers.clone(),
                body: body.clone(),
            };
            let client = Arc::clone(&self.client);
            let host = host.clone();
            calls.push((
                host,
                self.http_pool.spawn(async move { client.send(request).await }),
            ));
        }

        let total = calls.len();
        let mut failed = 0;
        for (host, handle) in calls {
            match handle.await {
                Ok(Some(Ok(status))) => {
                    self.stats.sent.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(host = %host, status = status.as_u16(), "shadow call completed");
                }
                Ok(Some(Err(e))) => {
                    failed += 1;
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(host = %host, error = %e, "shadow call failed");
                }
                Ok(None) => {
                    failed += 1;
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    failed += 1;
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(host = %host, error = %e, "shadow call task aborted");
                }
            }
        }

        Ok(DispatchOutcome::Sent {
            calls: total,
            failed,
        })
    }
}

fn resolve_method(method: &str) -> Option<Method> {
    match method {
        "GET" => Some(Method::GET),
        "HEAD" => Some(Method::HEAD),
        "POST" => Some(Method::POST),
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        "OPTIONS" => Some(Method::OPTIONS),
        "TRACE" => Some(Method::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_methods_resolve() {
        assert_eq!(resolve_method("PATCH"), Some(Method::PATCH));
        assert_eq!(resolve_method("PURGE"), None);
        assert_eq!(resolve_method("get"), None);
        assert_eq!(resolve_method(""), None);
    }
}
