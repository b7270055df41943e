use crate::{
    Config,
    error::ProviderError,
    model::{QueryKind, WeatherPoint},
    provider::{
        openmeteo::OpenMeteoProvider, openweather::OpenWeatherProvider,
        yandex::YandexWeatherProvider,
    },
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug, time::Duration};
use tracing::warn;

pub mod openmeteo;
pub mod openweather;
pub mod yandex;

/// Timeout applied to every outbound provider request. A provider that
/// exceeds it counts as a transient failure and fallback proceeds.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenMeteo,
    OpenWeather,
    Yandex,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "openmeteo",
            ProviderId::OpenWeather => "openweather",
            ProviderId::Yandex => "yandex",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenMeteo, ProviderId::OpenWeather, ProviderId::Yandex]
    }

    /// Whether requests to this provider must carry an API key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderId::OpenMeteo)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openmeteo" => Ok(ProviderId::OpenMeteo),
            "openweather" => Ok(ProviderId::OpenWeather),
            "yandex" => Ok(ProviderId::Yandex),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openmeteo, openweather, yandex."
            )),
        }
    }
}

/// A remote weather data source.
///
/// Implementations translate one provider's native response into
/// normalized [`WeatherPoint`]s or report a typed [`ProviderError`]. Each
/// call performs exactly one outbound request; retry across sources is the
/// engine's job, not the adapter's.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    /// Query kinds this provider can answer. Declared up front so the
    /// engine can skip incapable providers without probing at call time.
    fn capabilities(&self) -> &'static [QueryKind];

    async fn current(&self, latitude: f64, longitude: f64)
    -> Result<WeatherPoint, ProviderError>;

    async fn hourly(
        &self,
        _latitude: f64,
        _longitude: f64,
        _hours: u32,
    ) -> Result<Vec<WeatherPoint>, ProviderError> {
        Err(ProviderError::transient(format!("{} does not answer hourly queries", self.id())))
    }

    async fn daily(
        &self,
        _latitude: f64,
        _longitude: f64,
        _days: u32,
    ) -> Result<Vec<WeatherPoint>, ProviderError> {
        Err(ProviderError::transient(format!("{} does not answer daily queries", self.id())))
    }
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let base_url = config.provider_base_url(id).map(str::to_owned);

    let boxed: Box<dyn WeatherProvider> = match id {
        ProviderId::OpenMeteo => {
            let mut provider = OpenMeteoProvider::new();
            if let Some(url) = base_url {
                provider = provider.with_base_url(url);
            }
            Box::new(provider)
        }
        ProviderId::OpenWeather => {
            let mut provider = OpenWeatherProvider::new(require_api_key(id, config)?);
            if let Some(url) = base_url {
                provider = provider.with_base_url(url);
            }
            Box::new(provider)
        }
        ProviderId::Yandex => {
            let mut provider = YandexWeatherProvider::new(require_api_key(id, config)?);
            if let Some(url) = base_url {
                provider = provider.with_base_url(url);
            }
            Box::new(provider)
        }
    };

    Ok(boxed)
}

fn require_api_key(id: ProviderId, config: &Config) -> anyhow::Result<String> {
    config.provider_api_key(id).map(str::to_owned).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
             Hint: run `meteo configure {id}` and enter your API key."
        )
    })
}

/// Construct the configured provider chain in priority order.
///
/// Providers that cannot be built (typically a missing API key) are
/// skipped with a warning, mirroring how the priority order is meant to
/// degrade; an empty result is an error.
pub fn providers_from_config(config: &Config) -> anyhow::Result<Vec<Box<dyn WeatherProvider>>> {
    let mut providers: Vec<Box<dyn WeatherProvider>> = Vec::new();

    for id in config.priority_ids()? {
        match provider_from_config(id, config) {
            Ok(provider) => providers.push(provider),
            Err(err) => warn!(provider = %id, "skipping provider: {err:#}"),
        }
    }

    if providers.is_empty() {
        anyhow::bail!(
            "No usable weather providers configured.\n\
             Hint: run `meteo configure <provider>` or add 'openmeteo' to the priority list."
        );
    }

    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn only_openmeteo_is_keyless() {
        assert!(!ProviderId::OpenMeteo.requires_api_key());
        assert!(ProviderId::OpenWeather.requires_api_key());
        assert!(ProviderId::Yandex.requires_api_key());
    }

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(ProviderId::OpenWeather, &cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured for provider"));
    }

    #[test]
    fn keyless_provider_builds_from_empty_config() {
        let cfg = Config::default();
        let provider = provider_from_config(ProviderId::OpenMeteo, &cfg)
            .expect("openmeteo needs no key");
        assert_eq!(provider.id(), ProviderId::OpenMeteo);
    }

    #[test]
    fn providers_from_config_skips_unconfigured_keyed_providers() {
        // Default priority ends with the keyless provider, so an empty
        // config still yields a usable single-provider chain.
        let cfg = Config::default();
        let providers = providers_from_config(&cfg).expect("chain should build");

        let ids: Vec<ProviderId> = providers.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![ProviderId::OpenMeteo]);
    }

    #[test]
    fn providers_from_config_respects_priority_order() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "KEY".to_string());
        cfg.priority = vec!["openweather".to_string(), "openmeteo".to_string()];

        let providers = providers_from_config(&cfg).expect("chain should build");
        let ids: Vec<ProviderId> = providers.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![ProviderId::OpenWeather, ProviderId::OpenMeteo]);
    }
}
