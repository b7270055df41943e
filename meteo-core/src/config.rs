use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::engine::CacheTtls;
use crate::provider::ProviderId;

/// Configuration for a single provider (API key, optional endpoint
/// override).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Cache lifetimes in seconds, per query kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub current_ttl_secs: u64,
    pub forecast_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { current_ttl_secs: 600, forecast_ttl_secs: 1800 }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Provider ids in fallback priority order, e.g. ["openweather",
    /// "yandex", "openmeteo"]. Empty means the built-in default order.
    #[serde(default)]
    pub priority: Vec<String>,

    /// Example TOML:
    /// [providers.openweather]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Keyed providers first, the keyless one as the fallback of last resort.
const DEFAULT_PRIORITY: &[ProviderId] =
    &[ProviderId::OpenWeather, ProviderId::Yandex, ProviderId::OpenMeteo];

impl Config {
    /// The fallback order as strongly-typed ids. Unknown names in the
    /// configured list are an error, not silently dropped.
    pub fn priority_ids(&self) -> Result<Vec<ProviderId>> {
        if self.priority.is_empty() {
            return Ok(DEFAULT_PRIORITY.to_vec());
        }

        self.priority.iter().map(|name| ProviderId::try_from(name.as_str())).collect()
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, id: ProviderId) -> Option<&str> {
        self.provider_config(id).and_then(|cfg| cfg.api_key.as_deref())
    }

    pub fn provider_base_url(&self, id: ProviderId) -> Option<&str> {
        self.provider_config(id).and_then(|cfg| cfg.base_url.as_deref())
    }

    pub fn is_provider_configured(&self, id: ProviderId) -> bool {
        self.provider_api_key(id).is_some()
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            current: Duration::from_secs(self.cache.current_ttl_secs),
            forecast: Duration::from_secs(self.cache.forecast_ttl_secs),
        }
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "meteo", "meteo-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Convenience helper: set/replace a provider API key; a provider
    /// configured for the first time is appended to the priority list.
    pub fn upsert_provider_api_key(&mut self, id: ProviderId, api_key: String) {
        self.providers.entry(id.as_str().to_string()).or_default().api_key = Some(api_key);

        if !self.priority.is_empty() && !self.priority.iter().any(|name| name == id.as_str()) {
            self.priority.push(id.as_str().to_string());
        }
    }
}
