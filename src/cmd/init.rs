//! `shadowtraffic init`: generate a starter configuration file.
//!
//! Writes a YAML, JSON, or TOML config with either a minimal or a fully
//! annotated template.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::ShadowTrafficError;

pub fn execute(args: &InitArgs) -> Result<(), ShadowTrafficError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("shadowtraffic.{}", args.format.extension())));

    if output.exists() {
        return Err(ShadowTrafficError::FileExists { path: output });
    }

    std::fs::write(&output, template(&args.format, args.full))?;
    println!("Created {}", output.display());
    Ok(())
}

#[must_use]
pub const fn template(format: &ConfigFormat, full: bool) -> &'static str {
    match (format, full) {
        (ConfigFormat::Yaml, false) => YAML_MINIMAL,
        (ConfigFormat::Yaml, true) => YAML_FULL,
        (ConfigFormat::Json, false) => JSON_MINIMAL,
        (ConfigFormat::Json, true) => JSON_FULL,
        (ConfigFormat::Toml, false) => TOML_MINIMAL,
        (ConfigFormat::Toml, true) => TOML_FULL,
    }
}

const YAML_MINIMAL: &str = r#"# shadowtraffic config

upstream:
  url: "http://localhost:8080"

shadow:
  enabled: true
  percentage: 10
  hosts:
    - "shadow.internal"
  inclusionPatterns:
    - requestURI: "/api/.*"
      method: "GET"
"#;

const YAML_FULL: &str = r#"# shadowtraffic config
#
# Values marked "default" may be omitted.

# Where original requests are forwarded. Without it every proxied request
# is answered with 404 (shadowing still happens).
upstream:
  url: "http://localhost:8080"
  # timeout: 5000                 # ms, default

shadow:
  enabled: true                   # default: false
  percentage: 10                  # 0..=100 of matching requests, default: 0

  # Bare hosts are reached over https; keep a scheme to override.
  hosts:
    - "shadow.internal"
    # - "http://10.0.0.12:8080"

  # A request is shadowed when any rule matches. requestURI must match the
  # whole path. headerPatterns (optional) narrow a rule; any one matching
  # header pattern is enough. Header values match case-insensitively.
  inclusionPatterns:
    - requestURI: "/api/.*"
      method: "GET"               # default: "*"
    # - requestURI: "/checkout"
    #   method: "POST"
    #   headerPatterns:
    #     - headerKey: "x-client"
    #       headerValue: "web-.*"

  # Sent as "shadow-traffic-<name>: <value>" on every shadow request.
  customHeaders: {}
  #   team: "search"

  # Original request headers copied onto shadow requests.
  forwardHeaders: []
  #   - "Authorization"
  #   - "Content-Type"

  # dispatchPoolSize: 5           # concurrent dispatches, default
  # httpPoolSize: 5               # concurrent shadow calls, default
  # connectTimeoutMs: 1000        # default
  # readTimeoutMs: 300            # default
  # origin: "edge-01"             # default: this machine's host name
"#;

const JSON_MINIMAL: &str = r#"{
  "upstream": { "url": "http://localhost:8080" },
  "shadow": {
    "enabled": true,
    "percentage": 10,
    "hosts": ["shadow.internal"],
    "inclusionPatterns": [
      { "requestURI": "/api/.*", "method": "GET" }
    ]
  }
}
"#;

const JSON_FULL: &str = r#"{
  "upstream": { "url": "http://localhost:8080", "timeout": 5000 },
  "shadow": {
    "enabled": true,
    "percentage": 10,
    "hosts": ["shadow.internal"],
    "inclusionPatterns": [
      {
        "requestURI": "/api/.*",
        "method": "GET",
        "headerPatterns": [
          { "headerKey": "x-client", "headerValue": "web-.*" }
        ]
      }
    ],
    "customHeaders": { "team": "search" },
    "forwardHeaders": ["Authorization", "Content-Type"],
    "dispatchPoolSize": 5,
    "httpPoolSize": 5,
    "connectTimeoutMs": 1000,
    "readTimeoutMs": 300
  }
}
"#;

const TOML_MINIMAL: &str = r#"# shadowtraffic config

[upstream]
url = "http://localhost:8080"

[shadow]
enabled = true
percentage = 10
hosts = ["shadow.internal"]

[[shadow.inclusionPatterns]]
requestURI = "/api/.*"
method = "GET"
"#;

const TOML_FULL: &str = r#"# shadowtraffic config
#
# Values marked "default" may be omitted.

[upstream]
url = "http://localhost:8080"
# timeout = 5000                  # ms, default

[shadow]
enabled = true                    # default: false
percentage = 10                   # 0..=100 of matching requests, default: 0
hosts = ["shadow.internal"]       # bare hosts are reached over https
forwardHeaders = ["Authorization", "Content-Type"]
# dispatchPoolSize = 5            # default
# httpPoolSize = 5                # default
# connectTimeoutMs = 1000         # default
# readTimeoutMs = 300             # default
# origin = "edge-01"              # default: this machine's host name

[shadow.customHeaders]
team = "search"

[[shadow.inclusionPatterns]]
requestURI = "/api/.*"
method = "GET"

[[shadow.inclusionPatterns.headerPatterns]]
headerKey = "x-client"
headerValue = "web-.*"
"#;
