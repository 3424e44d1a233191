//! Serde data structures for the shadowtraffic configuration file.
//!
//! Contains [`Config`] (the root), [`Upstream`], [`ShadowConfig`],
//! [`InclusionRule`] and [`HeaderRule`]. Shadow settings use camelCase
//! keys on the wire; every type denies unknown fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Worker pool size used when the configuration leaves it unset.
pub const DEFAULT_POOL_SIZE: usize = 5;

pub const ALL_METHODS: &str = "*";

const fn default_timeout() -> u64 {
    5000
}

const fn default_connect_timeout_ms() -> u64 {
    1000
}

const fn default_read_timeout_ms() -> u64 {
    300
}

fn default_method() -> String {
    ALL_METHODS.to_string()
}

fn is_default_timeout(v: &u64) -> bool {
    *v == default_timeout()
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_all_methods(v: &str) -> bool {
    v == ALL_METHODS
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Where the original request is forwarded. Without it the server
    /// only shadows and answers `404` itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<Upstream>,

    #[serde(default)]
    pub shadow: ShadowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Upstream {
    pub url: String,

    #[serde(
        default = "default_timeout",
        skip_serializing_if = "is_default_timeout"
    )]
    pub timeout: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ShadowConfig {
    #[serde(default, skip_serializing_if = "is_false")]
    pub enabled: bool,

    /// Share of matching requests to shadow, `0..=100`.
    #[serde(default)]
    pub percentage: i32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inclusion_patterns: Vec<InclusionRule>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_headers: BTreeMap<String, String>,

    /// Original request headers copied onto shadow requests, matched
    /// case-insensitively.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forward_headers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_pool_size: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_pool_size: Option<usize>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Overrides the host name sent in the shadow-origin header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            percentage: 0,
            hosts: Vec::new(),
            inclusion_patterns: Vec::new(),
            custom_headers: BTreeMap::new(),
            forward_headers: Vec::new(),
            dispatch_pool_size: None,
            http_pool_size: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            origin: None,
        }
    }
}

impl ShadowConfig {
    #[must_use]
    pub fn dispatch_pool_size(&self) -> usize {
        pool_size_or_default(self.dispatch_pool_size)
    }

    #[must_use]
    pub fn http_pool_size(&self) -> usize {
        pool_size_or_default(self.http_pool_size)
    }
}

fn pool_size_or_default(size: Option<usize>) -> usize {
    size.filter(|n| *n > 0).unwrap_or(DEFAULT_POOL_SIZE)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct InclusionRule {
    /// Regular expression that must match the whole request path.
    #[serde(rename = "requestURI")]
    pub request_uri: String,

    #[serde(default = "default_method", skip_serializing_if = "is_all_methods")]
    pub method: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header_patterns: Vec<HeaderRule>,
}

/// Header fingerprint narrowing an [`InclusionRule`]. Rules missing
/// either half are ignored during evaluation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct HeaderRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_value: Option<String>,
}
