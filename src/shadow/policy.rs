//! Per-request inclusion decision.
//!
//! [`InclusionPolicy`] is the compiled form of a [`ShadowConfig`]'s
//! inclusion rules. It is built once per loaded configuration and then
//! evaluated for every request without touching the regex compiler.
//! [`should_shadow`] compiles and evaluates in one step.
//!
//! Evaluation defaults to "do not shadow" whenever configuration is
//! absent, disabled, malformed or simply does not match, and it never
//! shadows a request that is itself shadow traffic.

use std::collections::HashMap;

use axum::http::{HeaderMap, Method};
use regex::{Regex, RegexBuilder};

use crate::config::model::{InclusionRule, ShadowConfig, ALL_METHODS};

use super::headers::{SHADOW_MARKER_KEY, SHADOW_MARKER_VALUE};

/// Compile `pattern` so that it must match the entire input.
pub fn full_match(pattern: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(case_insensitive)
        .build()
}

#[derive(Debug, Default)]
pub struct InclusionPolicy {
    enabled: bool,
    rules: Vec<CompiledRule>,
}

/// A rule whose `requestURI` compiled. Rules that fail to compile are
/// dropped with a warning when the policy is built.
#[derive(Debug)]
struct CompiledRule {
    uri: Regex,
    method: String,
    /// Whether the rule listed any header patterns, complete or not.
    has_header_patterns: bool,
    headers: Vec<HeaderPattern>,
}

#[derive(Debug)]
struct HeaderPattern {
    key: String,
    /// `None` when the value pattern does not compile; reaching it fails
    /// the whole rule.
    value: Option<Regex>,
}

impl InclusionPolicy {
    #[must_use]
    pub fn compile(config: &ShadowConfig) -> Self {
        let rules = config
            .inclusion_patterns
            .iter()
            .enumerate()
            .filter_map(|(idx, rule)| compile_rule(idx, rule))
            .collect();
        Self {
            enabled: config.enabled,
            rules,
        }
    }

    #[must_use]
    pub fn should_shadow(&self, method: &Method, path: &str, headers: &HeaderMap) -> bool {
        if !self.enabled {
            return false;
        }

        let Some(header_values) = scan_headers(headers) else {
            tracing::trace!(path, "request is already shadow traffic");
            return false;
        };

        self.rules
            .iter()
            .any(|rule| rule.matches(method, path, &header_values))
    }
}

#[must_use]
pub fn should_shadow(
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    config: Option<&ShadowConfig>,
) -> bool {
    config.is_some_and(|c| {
        c.enabled && InclusionPolicy::compile(c).should_shadow(method, path, headers)
    })
}

fn compile_rule(idx: usize, rule: &InclusionRule) -> Option<CompiledRule> {
    let uri = match full_match(&rule.request_uri, false) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(
                rule = idx,
                pattern = %rule.request_uri,
                error = %e,
                "invalid inclusion pattern, skipping rule"
            );
            return None;
        }
    };

    let headers = rule
        .header_patterns
        .iter()
        .filter_map(|h| Some((h.header_key.as_ref()?, h.header_value.as_ref()?)))
        .map(|(key, value)| HeaderPattern {
            key: key.to_ascii_lowercase(),
            value: full_match(&value.to_lowercase(), true)
                .map_err(|e| {
                    tracing::warn!(
                        rule = idx,
                        header = %key,
                        pattern = %value,
                        error = %e,
                        "invalid header pattern, rule will not match past it"
                    );
                })
                .ok(),
        })
        .collect();

    Some(CompiledRule {
        uri,
        method: rule.method.clone(),
        has_header_patterns: !rule.header_patterns.is_empty(),
        headers,
    })
}

impl CompiledRule {
    fn matches(&self, method: &Method, path: &str, header_values: &HashMap<&str, String>) -> bool {
        if !self.uri.is_match(path) || !method_matches(&self.method, method) {
            return false;
        }

        if !self.has_header_patterns {
            return true;
        }

        for pattern in &self.headers {
            let Some(actual) = header_values.get(pattern.key.as_str()) else {
                continue;
            };
            if actual.trim().is_empty() {
                continue;
            }
            match &pattern.value {
                Some(value) if value.is_match(actual) => return true,
                Some(_) => {}
                None => return false,
            }
        }

        false
    }
}

/// Lowercased name to lowercased first value, or `None` when the shadow
/// marker is present.
fn scan_headers(headers: &HeaderMap) -> Option<HashMap<&str, String>> {
    let mut values = HashMap::with_capacity(headers.keys_len());
    for name in headers.keys() {
        if name.as_str() == SHADOW_MARKER_KEY
            && headers.get_all(name).iter().any(|v| {
                v.to_str()
                    .is_ok_and(|s| s.trim().eq_ignore_ascii_case(SHADOW_MARKER_VALUE))
            })
        {
            return None;
        }
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            values.insert(name.as_str(), value.to_lowercase());
        }
    }
    Some(values)
}

fn method_matches(rule_method: &str, method: &Method) -> bool {
    rule_method == ALL_METHODS || rule_method.eq_ignore_ascii_case(method.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::HeaderRule;

    fn config(rules: Vec<InclusionRule>) -> ShadowConfig {
        ShadowConfig {
            enabled: true,
            percentage: 100,
            hosts: vec!["shadow.internal".into()],
            inclusion_patterns: rules,
            ..ShadowConfig::default()
        }
    }

    fn rule(uri: &str, method: &str, headers: &[(&str, &str)]) -> InclusionRule {
        InclusionRule {
            request_uri: uri.into(),
            method: method.into(),
            header_patterns: headers
                .iter()
                .map(|(k, v)| HeaderRule {
                    header_key: Some((*k).into()),
                    header_value: Some((*v).into()),
                })
                .collect(),
        }
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                v.parse().unwrap(),
            );
        }
        map
    }

    #[test]
    fn exact_path_and_method() {
        let cfg = config(vec![rule("^/hotels$", "GET", &[])]);
        assert!(should_shadow(&Method::GET, "/hotels", &HeaderMap::new(), Some(&cfg)));
        assert!(!should_shadow(&Method::POST, "/hotels", &HeaderMap::new(), Some(&cfg)));
    }

    #[test]
    fn method_comparison_ignores_case() {
        let cfg = config(vec![rule("/hotels", "get", &[])]);
        assert!(should_shadow(&Method::GET, "/hotels", &HeaderMap::new(), Some(&cfg)));
    }

    #[test]
    fn pattern_must_cover_whole_path() {
        let cfg = config(vec![rule("/hotels", "*", &[])]);
        assert!(!should_shadow(&Method::GET, "/hotels/42", &HeaderMap::new(), Some(&cfg)));
        assert!(!should_shadow(&Method::GET, "/api/hotels", &HeaderMap::new(), Some(&cfg)));
    }

    #[test]
    fn wildcard_method_matches_any() {
        let cfg = config(vec![rule("/hotels/.*", "*", &[])]);
        for method in [Method::GET, Method::POST, Method::DELETE, Method::PATCH] {
            assert!(should_shadow(&method, "/hotels/42", &HeaderMap::new(), Some(&cfg)));
        }
    }

    #[test]
    fn disabled_or_missing_config_never_shadows() {
        let mut cfg = config(vec![rule(".*", "*", &[])]);
        assert!(!should_shadow(&Method::GET, "/", &HeaderMap::new(), None));
        cfg.enabled = false;
        assert!(!should_shadow(&Method::GET, "/", &HeaderMap::new(), Some(&cfg)));
    }

    #[test]
    fn marker_header_prevents_loops() {
        let cfg = config(vec![rule(".*", "*", &[])]);
        let marked = headers(&[("Is-Shadow-Traffic", "TRUE")]);
        assert!(!should_shadow(&Method::GET, "/hotels", &marked, Some(&cfg)));

        let other_value = headers(&[("is-shadow-traffic", "false")]);
        assert!(should_shadow(&Method::GET, "/hotels", &other_value, Some(&cfg)));
    }

    #[test]
    fn no_rules_never_shadows() {
        let cfg = config(vec![]);
        assert!(!should_shadow(&Method::GET, "/hotels", &HeaderMap::new(), Some(&cfg)));
    }

    #[test]
    fn header_rule_match_is_case_insensitive() {
        let cfg = config(vec![rule("/hotels", "*", &[("X-Client", "Web-.*")])]);
        let request = headers(&[("x-client", "WEB-desktop")]);
        assert!(should_shadow(&Method::GET, "/hotels", &request, Some(&cfg)));
    }

    #[test]
    fn header_rule_mismatch_falls_through_to_next_rule() {
        let cfg = config(vec![
            rule("/hotels", "*", &[("x-client", "mobile")]),
            rule("/flights", "*", &[]),
        ]);
        let request = headers(&[("x-client", "web")]);
        assert!(!should_shadow(&Method::GET, "/hotels", &request, Some(&cfg)));
        assert!(should_shadow(&Method::GET, "/flights", &request, Some(&cfg)));
    }

    #[test]
    fn blank_header_value_never_matches() {
        let cfg = config(vec![rule("/hotels", "*", &[("x-client", ".*")])]);
        let request = headers(&[("x-client", "  ")]);
        assert!(!should_shadow(&Method::GET, "/hotels", &request, Some(&cfg)));
    }

    #[test]
    fn incomplete_header_rules_are_ignored() {
        let mut r = rule("/hotels", "*", &[("x-client", "web")]);
        r.header_patterns.insert(0, HeaderRule::default());
        let cfg = config(vec![r]);
        let request = headers(&[("x-client", "web")]);
        assert!(should_shadow(&Method::GET, "/hotels", &request, Some(&cfg)));
    }

    #[test]
    fn invalid_pattern_skips_only_that_rule() {
        let cfg = config(vec![rule("/hotels(", "*", &[]), rule("/hotels", "*", &[])]);
        assert!(should_shadow(&Method::GET, "/hotels", &HeaderMap::new(), Some(&cfg)));
    }

    #[test]
    fn invalid_header_pattern_skips_rule() {
        let cfg = config(vec![rule("/hotels", "*", &[("x-client", "web(")])]);
        let request = headers(&[("x-client", "web(")]);
        assert!(!should_shadow(&Method::GET, "/hotels", &request, Some(&cfg)));
    }

    #[test]
    fn compiled_policy_is_reused_across_requests() {
        let cfg = config(vec![
            rule("/hotels(", "*", &[]),
            rule("/hotels/[0-9]+", "GET", &[("x-client", "web")]),
        ]);
        let policy = InclusionPolicy::compile(&cfg);
        assert_eq!(policy.rules.len(), 1);

        let web = headers(&[("x-client", "web")]);
        let mobile = headers(&[("x-client", "mobile")]);
        for id in 1..=3 {
            let path = format!("/hotels/{id}");
            assert!(policy.should_shadow(&Method::GET, &path, &web));
            assert!(!policy.should_shadow(&Method::GET, &path, &mobile));
        }
    }

    #[test]
    fn default_policy_never_shadows() {
        let policy = InclusionPolicy::default();
        assert!(!policy.should_shadow(&Method::GET, "/", &HeaderMap::new()));
    }
}
