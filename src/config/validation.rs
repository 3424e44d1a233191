//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for the mistakes
//! that would otherwise only surface as runtime log lines: sampling
//! percentages outside `0..=100`, hosts that cannot form a URL, inclusion
//! rules whose patterns do not compile, unknown methods, incomplete
//! header rules, zero-sized pools, and header names that HTTP rejects.

use axum::http::{HeaderName, HeaderValue};
use url::Url;

use super::model::{Config, InclusionRule, ShadowConfig};
use crate::error::ValidationError;
use crate::shadow::headers::CUSTOM_HEADER_PREFIX;
use crate::shadow::policy::full_match;
use crate::shadow::target::build_target_url;

pub const VALID_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "TRACE", "*",
];

/// Validate an HTTP method string. Returns `Ok(())` or a human-readable error.
pub fn validate_method(method: &str) -> Result<(), String> {
    let upper = method.to_uppercase();
    if VALID_METHODS.contains(&upper.as_str()) {
        Ok(())
    } else {
        Err(format!("'{method}' is not a valid HTTP method"))
    }
}

/// Validate a shadow host as it will be resolved at dispatch time.
pub fn validate_host(host: &str) -> Result<(), String> {
    if host.trim().is_empty() {
        return Err("host cannot be blank".into());
    }
    build_target_url(host, "/", None)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Validate the upstream URL. Returns `Ok(())` or a human-readable error.
pub fn validate_upstream_url(url: &str) -> Result<(), String> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(parsed) => Err(format!(
            "unsupported scheme '{}' (expected http or https)",
            parsed.scheme()
        )),
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Some(ref upstream) = config.upstream {
        if let Err(msg) = validate_upstream_url(&upstream.url) {
            errors.push(error("upstream", "url", msg, None));
        }
        if upstream.timeout == 0 {
            errors.push(error(
                "upstream",
                "timeout",
                "timeout must be greater than zero".into(),
                None,
            ));
        }
    }

    validate_shadow(&config.shadow, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_shadow(shadow: &ShadowConfig, errors: &mut Vec<ValidationError>) {
    if !(0..=100).contains(&shadow.percentage) {
        errors.push(error(
            "shadow",
            "percentage",
            format!("{} is outside 0..=100", shadow.percentage),
            Some("use 100 to shadow every matching request".into()),
        ));
    }

    if shadow.enabled && shadow.hosts.is_empty() {
        errors.push(error(
            "shadow",
            "hosts",
            "shadowing is enabled but no hosts are configured".into(),
            None,
        ));
    }

    for (i, host) in shadow.hosts.iter().enumerate() {
        if let Err(msg) = validate_host(host) {
            errors.push(error(&format!("shadow.hosts[{i}]"), "host", msg, None));
        }
    }

    for (i, rule) in shadow.inclusion_patterns.iter().enumerate() {
        validate_rule(&format!("shadow.inclusionPatterns[{i}]"), rule, errors);
    }

    for (key, value) in &shadow.custom_headers {
        let name = format!("{CUSTOM_HEADER_PREFIX}{key}");
        if HeaderName::try_from(name.as_str()).is_err() {
            errors.push(error(
                "shadow.customHeaders",
                key,
                format!("'{name}' is not a valid header name"),
                None,
            ));
        }
        if HeaderValue::from_str(value).is_err() {
            errors.push(error(
                "shadow.customHeaders",
                key,
                "value is not a valid header value".into(),
                None,
            ));
        }
    }

    for name in &shadow.forward_headers {
        if HeaderName::try_from(name.as_str()).is_err() {
            errors.push(error(
                "shadow.forwardHeaders",
                name,
                "not a valid header name".into(),
                None,
            ));
        }
    }

    for (field, size) in [
        ("dispatchPoolSize", shadow.dispatch_pool_size),
        ("httpPoolSize", shadow.http_pool_size),
    ] {
        if size == Some(0) {
            errors.push(error(
                "shadow",
                field,
                "pool size must be greater than zero".into(),
                Some("omit the field to use the default of 5".into()),
            ));
        }
    }

    for (field, value) in [
        ("connectTimeoutMs", shadow.connect_timeout_ms),
        ("readTimeoutMs", shadow.read_timeout_ms),
    ] {
        if value == 0 {
            errors.push(error(
                "shadow",
                field,
                "timeout must be greater than zero".into(),
                None,
            ));
        }
    }
}

fn validate_rule(location: &str, rule: &InclusionRule, errors: &mut Vec<ValidationError>) {
    if let Err(e) = full_match(&rule.request_uri, false) {
        errors.push(error(
            location,
            "requestURI",
            format!("invalid pattern: {e}"),
            None,
        ));
    }

    if let Err(msg) = validate_method(&rule.method) {
        errors.push(error(location, "method", msg, Some("use '*' for any method".into())));
    }

    for (j, header_rule) in rule.header_patterns.iter().enumerate() {
        let field = format!("headerPatterns[{j}]");
        match (&header_rule.header_key, &header_rule.header_value) {
            (Some(_), Some(value)) => {
                if let Err(e) = full_match(&value.to_lowercase(), true) {
                    errors.push(error(
                        location,
                        &field,
                        format!("invalid headerValue pattern: {e}"),
                        None,
                    ));
                }
            }
            _ => errors.push(error(
                location,
                &field,
                "headerKey and headerValue are both required".into(),
                None,
            )),
        }
    }
}

fn error(location: &str, field: &str, message: String, suggestion: Option<String>) -> ValidationError {
    ValidationError {
        location: location.into(),
        field: field.into(),
        message,
        suggestion,
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let shadow = &config.shadow;
    let state = if shadow.enabled { "enabled" } else { "disabled" };
    let mut lines = vec![format!(
        "  shadowing {state}, {}% sampled, {} hosts, {} inclusion rules\n",
        shadow.percentage,
        shadow.hosts.len(),
        shadow.inclusion_patterns.len()
    )];

    if let Some(ref upstream) = config.upstream {
        lines.push(format!(
            "  upstream: {} ({}ms timeout)",
            upstream.url, upstream.timeout
        ));
    }

    for host in &shadow.hosts {
        let target = build_target_url(host, "/", None)
            .map_or_else(|_| host.clone(), |url| url.to_string());
        lines.push(format!("  host: {target}"));
    }

    for rule in &shadow.inclusion_patterns {
        lines.push(format!(
            "  rule: {} {} ({} header patterns)",
            rule.method,
            rule.request_uri,
            rule.header_patterns.len()
        ));
    }

    lines.push(format!(
        "  pools: dispatch {}, http {}",
        shadow.dispatch_pool_size(),
        shadow.http_pool_size()
    ));

    format!("{} is valid\n{}", path, lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{HeaderRule, Upstream};

    fn minimal_config() -> Config {
        let mut config = Config::default();
        config.shadow.enabled = true;
        config.shadow.percentage = 50;
        config.shadow.hosts = vec!["shadow.internal".into()];
        config.shadow.inclusion_patterns = vec![InclusionRule {
            request_uri: "^/hotels$".into(),
            method: "GET".into(),
            header_patterns: vec![],
        }];
        config
    }

    fn rule(request_uri: &str, method: &str) -> InclusionRule {
        InclusionRule {
            request_uri: request_uri.into(),
            method: method.into(),
            header_patterns: vec![],
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn percentage_out_of_range_fails() {
        for percentage in [-1, 101] {
            let mut config = minimal_config();
            config.shadow.percentage = percentage;
            let errors = validate(&config).unwrap_err();
            assert!(errors.iter().any(|e| e.field == "percentage"));
        }
    }

    #[test]
    fn enabled_without_hosts_fails() {
        let mut config = minimal_config();
        config.shadow.hosts.clear();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("no hosts")));
    }

    #[test]
    fn disabled_without_hosts_passes() {
        let mut config = minimal_config();
        config.shadow.enabled = false;
        config.shadow.hosts.clear();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn blank_host_fails() {
        let mut config = minimal_config();
        config.shadow.hosts.push("   ".into());
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.location == "shadow.hosts[1]"));
    }

    #[test]
    fn uncompilable_uri_pattern_fails() {
        let mut config = minimal_config();
        config.shadow.inclusion_patterns.push(rule("/hotels(", "*"));
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.location == "shadow.inclusionPatterns[1]" && e.field == "requestURI"));
    }

    #[test]
    fn invalid_method_fails() {
        let mut config = minimal_config();
        config.shadow.inclusion_patterns.push(rule("/a", "FETCH"));
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("not a valid HTTP method")));
    }

    #[test]
    fn incomplete_header_rule_fails() {
        let mut config = minimal_config();
        config.shadow.inclusion_patterns[0]
            .header_patterns
            .push(HeaderRule {
                header_key: Some("x-client".into()),
                header_value: None,
            });
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "headerPatterns[0]"));
    }

    #[test]
    fn zero_pool_size_fails_with_suggestion() {
        let mut config = minimal_config();
        config.shadow.dispatch_pool_size = Some(0);
        let errors = validate(&config).unwrap_err();
        let err = errors
            .iter()
            .find(|e| e.field == "dispatchPoolSize")
            .unwrap();
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn invalid_custom_header_name_fails() {
        let mut config = minimal_config();
        config
            .shadow
            .custom_headers
            .insert("bad header".into(), "v".into());
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.location == "shadow.customHeaders"));
    }

    #[test]
    fn upstream_scheme_must_be_http() {
        let mut config = minimal_config();
        config.upstream = Some(Upstream {
            url: "ftp://files.internal".into(),
            timeout: 5000,
        });
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("unsupported scheme")));
    }

    #[test]
    fn report_lists_hosts_and_rules() {
        let report = format_validation_report("shadowtraffic.yaml", &minimal_config());
        assert!(report.starts_with("shadowtraffic.yaml is valid"));
        assert!(report.contains("host: https://shadow.internal/"));
        assert!(report.contains("rule: GET ^/hotels$"));
    }
}
