//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload containing the server
//! version, uptime, config source metadata, a summary of the active shadow
//! settings, and cumulative forwarding and shadowing statistics.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::config::ConfigVersion;
use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub config: ConfigHealth,
    pub shadow: ShadowHealth,
    pub stats: StatsResponse,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: String,
    pub loaded_ago_seconds: u64,
    pub reloads: u64,
    pub upstream: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ShadowHealth {
    pub enabled: bool,
    pub percentage: i32,
    pub hosts: usize,
    pub rules: usize,
    pub origin: String,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
    pub dispatches_submitted: u64,
    pub dispatches_not_sampled: u64,
    pub shadow_calls_sent: u64,
    pub shadow_calls_failed: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (config, source_name, version_str, loaded_ago) = {
        let loaded = state.config.read().await;
        let version_str = match &loaded.version {
            ConfigVersion::Hash(h) => h.get(..8).unwrap_or(h).to_string(),
        };
        (
            Arc::clone(&loaded.config),
            loaded.source_name.clone(),
            version_str,
            loaded.loaded_at.elapsed().as_secs(),
        )
    };

    let shadow_stats = state.dispatcher.stats().snapshot();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config: ConfigHealth {
            source: source_name,
            version: version_str,
            loaded_ago_seconds: loaded_ago,
            reloads: state.stats.config_reloads.load(Ordering::Relaxed),
            upstream: config.upstream.as_ref().map(|u| u.url.clone()),
        },
        shadow: ShadowHealth {
            enabled: config.shadow.enabled,
            percentage: config.shadow.percentage,
            hosts: config.shadow.hosts.len(),
            rules: config.shadow.inclusion_patterns.len(),
            origin: state.dispatcher.origin().to_string(),
        },
        stats: StatsResponse {
            requests_forwarded: state.stats.forwarded.load(Ordering::Relaxed),
            requests_failed: state.stats.failed.load(Ordering::Relaxed),
            dispatches_submitted: shadow_stats.dispatches_submitted,
            dispatches_not_sampled: shadow_stats.dispatches_not_sampled,
            shadow_calls_sent: shadow_stats.shadow_calls_sent,
            shadow_calls_failed: shadow_stats.shadow_calls_failed,
        },
    })
}
