//! Concrete [`ConfigSource`](super::ConfigSource) implementations.
//!
//! Provides the file-based [`FileSource`] (YAML, JSON, TOML, each gated
//! by a feature flag) and the [`parse_config_str`] helper used by
//! `validate` for one-shot parsing.

pub mod file_source;

pub use file_source::FileSource;

use sha2::{Digest, Sha256};

use crate::config::model::Config;
use crate::error::ShadowTrafficError;

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, ShadowTrafficError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => {
            serde_yml::from_str(content).map_err(|e| ShadowTrafficError::ConfigParse {
                path: path_display.to_string(),
                source: Box::new(e),
            })
        }

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| ShadowTrafficError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| ShadowTrafficError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(ShadowTrafficError::UnsupportedFormat(other.to_string())),
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_hex() {
        let digest = sha256_hex(b"shadow");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, sha256_hex(b"shadow"));
        assert_ne!(digest, sha256_hex(b"shadow\n"));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = parse_config_str("ini", "", "config.ini").unwrap_err();
        assert!(matches!(err, ShadowTrafficError::UnsupportedFormat(ref f) if f == "ini"));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn yaml_parse_error_names_the_file() {
        let err = parse_config_str("yaml", "shadow: [", "broken.yaml").unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }
}
