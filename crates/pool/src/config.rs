use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pool configuration, loadable from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Schemes addressing the host filesystem directly; never mounted
    pub direct_schemes: Vec<String>,
    /// Schemes served by the built-in zip provider
    pub archive_schemes: Vec<String>,
    /// Interval of the background sweeper, disabled when unset
    pub sweep_interval_secs: Option<u64>,
    pub entry_cache: EntryCacheConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            direct_schemes: resource::uri::DIRECT_SCHEMES
                .iter()
                .map(|scheme| scheme.to_string())
                .collect(),
            archive_schemes: vec!["jar".to_string(), "zip".to_string()],
            sweep_interval_secs: None,
            entry_cache: EntryCacheConfig::default(),
        }
    }
}

impl PoolConfig {
    pub fn from_toml_str(data: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(data)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Self::from_toml_str(&data)
    }

    pub fn is_direct_scheme(&self, scheme: &str) -> bool {
        self.direct_schemes
            .iter()
            .any(|direct| direct.eq_ignore_ascii_case(scheme))
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Sizing of the decompressed archive entry cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryCacheConfig {
    /// Maximum cached content in megabytes
    pub max_size_mb: u32,
    /// Time to live of a cached entry in seconds
    pub ttl_secs: u32,
}

impl Default for EntryCacheConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 64,
            ttl_secs: 300,
        }
    }
}
