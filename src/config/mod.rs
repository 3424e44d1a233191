//! Configuration loading, validation, and hot-reloading.
//!
//! Defines the [`ConfigSource`] trait for pluggable config backends,
//! the [`ConfigResolver`] for primary/fallback source resolution, the
//! [`ConfigVersion`] enum for change detection, and the [`ConfigStore`]
//! that every in-flight request and dispatch reads through the
//! [`ConfigAccessor`] trait.

pub mod model;
pub mod sources;
pub mod validation;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::error::ShadowTrafficError;
use crate::shadow::policy::InclusionPolicy;
use model::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    Hash(String),
}

// async_trait is required here because ConfigSource is used as Box<dyn ConfigSource>
// and native async fn in traits (Rust 1.75+) does not support dyn dispatch.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn load(&self) -> Result<(Config, ConfigVersion), ShadowTrafficError>;
    async fn has_changed(&self, current: &ConfigVersion) -> Result<bool, ShadowTrafficError>;
}

/// Read access to the configuration in effect right now.
///
/// Callers fetch once per decision or dispatch and work from that
/// snapshot; nothing is cached across calls.
#[async_trait]
pub trait ConfigAccessor: Send + Sync {
    async fn current(&self) -> Option<Arc<Config>>;
}

pub struct ConfigResolver {
    primary: Box<dyn ConfigSource>,
    fallback: Option<Box<dyn ConfigSource>>,
}

impl ConfigResolver {
    #[must_use]
    pub fn new(primary: Box<dyn ConfigSource>, fallback: Option<Box<dyn ConfigSource>>) -> Self {
        Self { primary, fallback }
    }

    /// Load from the primary source, or from the fallback when the
    /// primary fails. Returns the name of the source that was used.
    pub async fn load_with_fallback(
        &self,
    ) -> Result<(Config, ConfigVersion, &'static str), ShadowTrafficError> {
        match self.primary.load().await {
            Ok((config, version)) => Ok((config, version, self.primary.name())),
            Err(primary_err) => {
                let Some(ref fallback) = self.fallback else {
                    return Err(primary_err);
                };
                tracing::warn!(
                    primary = self.primary.name(),
                    fallback = fallback.name(),
                    error = %primary_err,
                    "primary config source failed, using fallback"
                );
                let (config, version) = fallback.load().await?;
                Ok((config, version, fallback.name()))
            }
        }
    }

    #[must_use]
    pub fn primary(&self) -> &dyn ConfigSource {
        &*self.primary
    }
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Arc<Config>,
    pub version: ConfigVersion,
    pub source_name: String,
    pub loaded_at: Instant,
}

/// Hot-swappable holder of the active [`LoadedConfig`].
///
/// Readers clone the inner `Arc<Config>` and release the lock before
/// doing any work, so a reload never changes a config mid-dispatch. The
/// compiled [`InclusionPolicy`] is rebuilt under the same lock whenever
/// the config is replaced.
#[derive(Debug)]
pub struct ConfigStore {
    active: RwLock<Active>,
}

#[derive(Debug)]
struct Active {
    loaded: LoadedConfig,
    policy: Arc<InclusionPolicy>,
}

impl Active {
    fn new(loaded: LoadedConfig) -> Self {
        let policy = Arc::new(InclusionPolicy::compile(&loaded.config.shadow));
        Self { loaded, policy }
    }
}

impl ConfigStore {
    #[must_use]
    pub fn new(loaded: LoadedConfig) -> Self {
        Self {
            active: RwLock::new(Active::new(loaded)),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, LoadedConfig> {
        RwLockReadGuard::map(self.active.read().await, |a| &a.loaded)
    }

    pub async fn version(&self) -> ConfigVersion {
        self.active.read().await.loaded.version.clone()
    }

    /// Inclusion rules of the active config, compiled.
    pub async fn policy(&self) -> Arc<InclusionPolicy> {
        Arc::clone(&self.active.read().await.policy)
    }

    pub async fn replace(&self, config: Config, version: ConfigVersion) {
        let policy = Arc::new(InclusionPolicy::compile(&config.shadow));
        let mut active = self.active.write().await;
        active.loaded.config = Arc::new(config);
        active.loaded.version = version;
        active.loaded.loaded_at = Instant::now();
        active.policy = policy;
    }
}

#[async_trait]
impl ConfigAccessor for ConfigStore {
    async fn current(&self) -> Option<Arc<Config>> {
        Some(Arc::clone(&self.active.read().await.loaded.config))
    }
}
