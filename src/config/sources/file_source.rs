//! File-backed config source with SHA-256 change detection.
//!
//! A [`FileSource`] pairs a path with a format-specific parser. Every
//! `load` re-reads the file through Tokio, validates the parsed
//! [`Config`], and versions it by content hash so the refresh loop can
//! tell when an operator edited the shadow settings.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::sha256_hex;
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::ShadowTrafficError;

type ParseFn = fn(&str) -> Result<Config, Box<dyn std::error::Error + Send + Sync>>;

pub struct FileSource {
    path: PathBuf,
    name: &'static str,
    parse: ParseFn,
}

impl FileSource {
    #[must_use]
    pub fn new(path: PathBuf, name: &'static str, parse: ParseFn) -> Self {
        Self { path, name, parse }
    }

    #[cfg(feature = "yaml")]
    #[must_use]
    pub fn yaml(path: PathBuf) -> Self {
        Self::new(path, "yaml", |content| {
            serde_yml::from_str::<Config>(content).map_err(Into::into)
        })
    }

    #[cfg(feature = "json")]
    #[must_use]
    pub fn json(path: PathBuf) -> Self {
        Self::new(path, "json", |content| {
            serde_json::from_str::<Config>(content).map_err(Into::into)
        })
    }

    #[cfg(feature = "toml")]
    #[must_use]
    pub fn toml(path: PathBuf) -> Self {
        Self::new(path, "toml", |content| {
            toml::from_str::<Config>(content).map_err(Into::into)
        })
    }

    /// Pick a source from the file extension, if that format is compiled in.
    pub fn for_path(path: &Path) -> Result<Self, ShadowTrafficError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Ok(Self::yaml(path.to_path_buf())),

            #[cfg(feature = "json")]
            "json" => Ok(Self::json(path.to_path_buf())),

            #[cfg(feature = "toml")]
            "toml" => Ok(Self::toml(path.to_path_buf())),

            other => Err(ShadowTrafficError::UnsupportedFormat(other.to_string())),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<String, ShadowTrafficError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ShadowTrafficError::ConfigFileNotFound {
                    path: self.path.clone(),
                })
            }
            Err(e) => Err(ShadowTrafficError::Io(e)),
        }
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn load(&self) -> Result<(Config, ConfigVersion), ShadowTrafficError> {
        let content = self.read().await?;
        let config = (self.parse)(&content).map_err(|source| ShadowTrafficError::ConfigParse {
            path: self.path.display().to_string(),
            source,
        })?;

        validate(&config).map_err(|errors| ShadowTrafficError::ConfigValidation { errors })?;

        let version = ConfigVersion::Hash(sha256_hex(content.as_bytes()));
        tracing::debug!(
            source = self.name,
            path = %self.path.display(),
            hosts = config.shadow.hosts.len(),
            rules = config.shadow.inclusion_patterns.len(),
            "config loaded"
        );
        Ok((config, version))
    }

    async fn has_changed(&self, current: &ConfigVersion) -> Result<bool, ShadowTrafficError> {
        let content = self.read().await?;
        Ok(*current != ConfigVersion::Hash(sha256_hex(content.as_bytes())))
    }
}
