use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::{
    error::ProviderError,
    model::{QueryKind, WeatherPoint, kmh_to_ms},
    provider::REQUEST_TIMEOUT,
};

use super::{ProviderId, WeatherProvider};

const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Open-Meteo adapter. Keyless; reports wind in km/h, which is converted
/// to m/s here.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    http: Client,
}

impl OpenMeteoProvider {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch(&self, query: &[(&str, String)]) -> Result<String, ProviderError> {
        let res = self
            .http
            .get(&self.base_url)
            .timeout(REQUEST_TIMEOUT)
            .query(query)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(ProviderError::from_status(status, &body));
        }

        Ok(body)
    }

    async fn fetch_current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherPoint, ProviderError> {
        let body = self
            .fetch(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                (
                    "current",
                    "temperature_2m,pressure_msl,windspeed_10m,precipitation".to_string(),
                ),
                ("timezone", "UTC".to_string()),
            ])
            .await?;

        let parsed: OmCurrentResponse = parse_json(&body)?;
        let current = parsed
            .current
            .ok_or_else(|| ProviderError::malformed("missing current weather"))?;

        Ok(WeatherPoint {
            latitude,
            longitude,
            temperature_c: require(current.temperature_2m, "temperature_2m")?,
            pressure_hpa: require(current.pressure_msl, "pressure_msl")?,
            wind_speed_ms: kmh_to_ms(require(current.windspeed_10m, "windspeed_10m")?),
            precipitation_mm: current.precipitation.unwrap_or(0.0),
            source: ProviderId::OpenMeteo.as_str().to_string(),
            observed_at: parse_iso_utc(current.time.as_deref()),
        })
    }

    async fn fetch_hourly(
        &self,
        latitude: f64,
        longitude: f64,
        hours: u32,
    ) -> Result<Vec<WeatherPoint>, ProviderError> {
        let body = self
            .fetch(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                (
                    "hourly",
                    "temperature_2m,pressure_msl,windspeed_10m,precipitation".to_string(),
                ),
                ("timezone", "UTC".to_string()),
            ])
            .await?;

        let parsed: OmHourlyResponse = parse_json(&body)?;
        let hourly = parsed
            .hourly
            .ok_or_else(|| ProviderError::malformed("missing hourly data"))?;
        if hourly.time.is_empty() {
            return Err(ProviderError::malformed("missing hourly data"));
        }

        let mut points = Vec::new();
        for (idx, ts) in hourly.time.iter().take(hours as usize).enumerate() {
            points.push(WeatherPoint {
                latitude,
                longitude,
                temperature_c: require(value_at(&hourly.temperature_2m, idx), "temperature_2m")?,
                pressure_hpa: require(value_at(&hourly.pressure_msl, idx), "pressure_msl")?,
                wind_speed_ms: kmh_to_ms(require(
                    value_at(&hourly.windspeed_10m, idx),
                    "windspeed_10m",
                )?),
                precipitation_mm: value_at(&hourly.precipitation, idx).unwrap_or(0.0),
                source: ProviderId::OpenMeteo.as_str().to_string(),
                observed_at: parse_iso_utc(Some(ts)),
            });
        }

        Ok(points)
    }

    async fn fetch_daily(
        &self,
        latitude: f64,
        longitude: f64,
        days: u32,
    ) -> Result<Vec<WeatherPoint>, ProviderError> {
        let body = self
            .fetch(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,precipitation_sum,\
                     windspeed_10m_max,surface_pressure_mean"
                        .to_string(),
                ),
                ("timezone", "UTC".to_string()),
            ])
            .await?;

        let parsed: OmDailyResponse = parse_json(&body)?;
        let daily = parsed
            .daily
            .ok_or_else(|| ProviderError::malformed("missing daily data"))?;
        if daily.time.is_empty() {
            return Err(ProviderError::malformed("missing daily data"));
        }

        let mut points = Vec::new();
        for (idx, date) in daily.time.iter().take(days as usize).enumerate() {
            let temperature_c = match (
                value_at(&daily.temperature_2m_min, idx),
                value_at(&daily.temperature_2m_max, idx),
            ) {
                (Some(min), Some(max)) => (min + max) / 2.0,
                (Some(only), None) | (None, Some(only)) => only,
                (None, None) => {
                    return Err(ProviderError::malformed("missing daily temperature"));
                }
            };

            points.push(WeatherPoint {
                latitude,
                longitude,
                temperature_c,
                pressure_hpa: require(
                    value_at(&daily.surface_pressure_mean, idx),
                    "surface_pressure_mean",
                )?,
                wind_speed_ms: kmh_to_ms(require(
                    value_at(&daily.windspeed_10m_max, idx),
                    "windspeed_10m_max",
                )?),
                precipitation_mm: value_at(&daily.precipitation_sum, idx).unwrap_or(0.0),
                source: ProviderId::OpenMeteo.as_str().to_string(),
                observed_at: parse_iso_utc(Some(date)),
            });
        }

        Ok(points)
    }
}

impl Default for OpenMeteoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct OmCurrentResponse {
    #[serde(alias = "current_weather")]
    current: Option<OmCurrent>,
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    time: Option<String>,
    #[serde(alias = "temperature")]
    temperature_2m: Option<f64>,
    pressure_msl: Option<f64>,
    #[serde(alias = "windspeed")]
    windspeed_10m: Option<f64>,
    precipitation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OmHourlyResponse {
    hourly: Option<OmHourly>,
}

#[derive(Debug, Default, Deserialize)]
struct OmHourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pressure_msl: Vec<Option<f64>>,
    #[serde(default)]
    windspeed_10m: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OmDailyResponse {
    daily: Option<OmDaily>,
}

#[derive(Debug, Default, Deserialize)]
struct OmDaily {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    windspeed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    surface_pressure_mean: Vec<Option<f64>>,
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenMeteo
    }

    fn capabilities(&self) -> &'static [QueryKind] {
        &[QueryKind::Current, QueryKind::Hourly, QueryKind::Daily]
    }

    async fn current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherPoint, ProviderError> {
        self.fetch_current(latitude, longitude).await
    }

    async fn hourly(
        &self,
        latitude: f64,
        longitude: f64,
        hours: u32,
    ) -> Result<Vec<WeatherPoint>, ProviderError> {
        self.fetch_hourly(latitude, longitude, hours).await
    }

    async fn daily(
        &self,
        latitude: f64,
        longitude: f64,
        days: u32,
    ) -> Result<Vec<WeatherPoint>, ProviderError> {
        self.fetch_daily(latitude, longitude, days).await
    }
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body)
        .map_err(|err| ProviderError::malformed(format!("invalid Open-Meteo JSON: {err}")))
}

fn require(value: Option<f64>, field: &str) -> Result<f64, ProviderError> {
    value.ok_or_else(|| ProviderError::malformed(format!("missing {field}")))
}

fn value_at(values: &[Option<f64>], idx: usize) -> Option<f64> {
    values.get(idx).copied().flatten()
}

/// Open-Meteo timestamps come without a zone and sometimes without
/// seconds ("2023-10-10T00:00"); daily entries are bare dates.
fn parse_iso_utc(value: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = value else {
        return Utc::now();
    };
    let raw = raw.trim_end_matches('Z');

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|date| date.and_time(NaiveTime::MIN))
        })
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now())
}
