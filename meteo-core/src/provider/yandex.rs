use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::ProviderError,
    model::{QueryKind, WeatherPoint, mmhg_to_hpa, pa_to_hpa},
    provider::REQUEST_TIMEOUT,
};

use super::{ProviderId, WeatherProvider};

const DEFAULT_BASE_URL: &str = "https://api.weather.yandex.ru/v2/forecast";

/// Yandex Weather adapter. Authenticates with the `X-Yandex-API-Key`
/// header; pressure arrives in pascals or mmHg and is normalized to hPa.
#[derive(Debug, Clone)]
pub struct YandexWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl YandexWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        hours: bool,
        limit: u32,
    ) -> Result<YxResponse, ProviderError> {
        let res = self
            .http
            .get(&self.base_url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("lang", "en_US".to_string()),
                ("hours", hours.to_string()),
                ("limit", limit.to_string()),
                ("extra", "true".to_string()),
            ])
            .header("X-Yandex-API-Key", &self.api_key)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(ProviderError::from_status(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|err| ProviderError::malformed(format!("invalid Yandex JSON: {err}")))
    }

    async fn fetch_current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherPoint, ProviderError> {
        let data = self.fetch(latitude, longitude, false, 1).await?;
        let fact = data
            .fact
            .ok_or_else(|| ProviderError::malformed("missing fact in response"))?;

        let observed_at = fact
            .obs_time
            .or(data.now)
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);

        build_point(&fact, observed_at, latitude, longitude)
    }

    async fn fetch_hourly(
        &self,
        latitude: f64,
        longitude: f64,
        hours: u32,
    ) -> Result<Vec<WeatherPoint>, ProviderError> {
        let data = self.fetch(latitude, longitude, true, 1).await?;
        let forecast = data
            .forecasts
            .first()
            .ok_or_else(|| ProviderError::malformed("missing forecasts in response"))?;

        let date = forecast
            .date
            .as_deref()
            .ok_or_else(|| ProviderError::malformed("missing forecast date"))?;
        let midnight = parse_date_utc(date)?;

        if forecast.hours.is_empty() {
            return Err(ProviderError::malformed("missing hourly data"));
        }

        let mut points = Vec::new();
        for obs in forecast.hours.iter().take(hours as usize) {
            let hour = obs.hour.as_deref().and_then(|h| h.parse::<i64>().ok()).unwrap_or(0);
            let observed_at = midnight + Duration::hours(hour);
            points.push(build_point(obs, observed_at, latitude, longitude)?);
        }

        Ok(points)
    }

    async fn fetch_daily(
        &self,
        latitude: f64,
        longitude: f64,
        days: u32,
    ) -> Result<Vec<WeatherPoint>, ProviderError> {
        let data = self.fetch(latitude, longitude, false, days).await?;
        if data.forecasts.is_empty() {
            return Err(ProviderError::malformed("missing forecasts in response"));
        }

        let mut points = Vec::new();
        for forecast in data.forecasts.iter().take(days as usize) {
            let day = forecast
                .parts
                .as_ref()
                .and_then(|parts| {
                    parts.day.as_ref().or(parts.day_short.as_ref()).or(parts.whole.as_ref())
                })
                .ok_or_else(|| ProviderError::malformed("missing day part in forecast"))?;

            let date = forecast
                .date
                .as_deref()
                .ok_or_else(|| ProviderError::malformed("missing forecast date"))?;

            points.push(build_point(day, parse_date_utc(date)?, latitude, longitude)?);
        }

        Ok(points)
    }
}

#[derive(Debug, Deserialize)]
struct YxResponse {
    now: Option<i64>,
    fact: Option<YxObservation>,
    #[serde(default)]
    forecasts: Vec<YxForecast>,
}

#[derive(Debug, Deserialize)]
struct YxObservation {
    temp: Option<f64>,
    temp_avg: Option<f64>,
    pressure_pa: Option<f64>,
    pressure_mm: Option<f64>,
    wind_speed: Option<f64>,
    precipitation: Option<f64>,
    prec_mm: Option<f64>,
    prec_mm_min: Option<f64>,
    prec_mm_max: Option<f64>,
    obs_time: Option<i64>,
    hour: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YxForecast {
    date: Option<String>,
    #[serde(default)]
    hours: Vec<YxObservation>,
    parts: Option<YxParts>,
}

#[derive(Debug, Deserialize)]
struct YxParts {
    day: Option<YxObservation>,
    day_short: Option<YxObservation>,
    whole: Option<YxObservation>,
}

#[async_trait]
impl WeatherProvider for YandexWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Yandex
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

fn build_point(
    obs: &YxObservation,
    observed_at: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
) -> Result<WeatherPoint, ProviderError> {
    Ok(WeatherPoint {
        latitude,
        longitude,
        temperature_c: obs
            .temp
            .or(obs.temp_avg)
            .ok_or_else(|| ProviderError::malformed("missing temperature"))?,
        pressure_hpa: extract_pressure(obs)?,
        wind_speed_ms: obs
            .wind_speed
            .ok_or_else(|| ProviderError::malformed("missing wind_speed"))?,
        precipitation_mm: extract_precipitation(obs),
        source: ProviderId::Yandex.as_str().to_string(),
        observed_at,
    })
}

fn extract_pressure(obs: &YxObservation) -> Result<f64, ProviderError> {
    if let Some(pa) = obs.pressure_pa {
        return Ok(pa_to_hpa(pa));
    }
    if let Some(mm) = obs.pressure_mm {
        return Ok(mmhg_to_hpa(mm));
    }
    Err(ProviderError::malformed("missing pressure"))
}

fn extract_precipitation(obs: &YxObservation) -> f64 {
    if let Some(value) = obs.precipitation.or(obs.prec_mm) {
        return value;
    }
    match (obs.prec_mm_min, obs.prec_mm_max) {
        (Some(min), Some(max)) => (min + max) / 2.0,
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => 0.0,
    }
}

fn parse_date_utc(raw: &str) -> Result<DateTime<Utc>, ProviderError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|err| ProviderError::malformed(format!("invalid forecast date '{raw}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> YandexWeatherProvider {
        YandexWeatherProvider::new("test".to_string()).with_base_url(server.uri())
    }

    #[tokio::test]
    async fn current_normalizes_mmhg_pressure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("X-Yandex-API-Key", "test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "now": 1_690_000_000_i64,
                "fact": {
                    "temp": 12,
                    "pressure_mm": 750,
                    "wind_speed": 5,
                    "precipitation": 0.4
                }
            })))
            .mount(&server)
            .await;

        let point = provider_for(&server).current(55.7, 37.6).await.unwrap();

        assert_eq!(point.temperature_c, 12.0);
        assert!((point.pressure_hpa - 999.92).abs() < 0.01);
        assert_eq!(point.wind_speed_ms, 5.0);
        assert_eq!(point.precipitation_mm, 0.4);
        assert_eq!(point.source, "yandex");
        assert_eq!(point.observed_at, DateTime::from_timestamp(1_690_000_000, 0).unwrap());
    }

    #[tokio::test]
    async fn pascals_take_precedence_over_mmhg() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "fact": {
                    "temp": 1.0,
                    "pressure_pa": 100_000,
                    "pressure_mm": 750,
                    "wind_speed": 2.0
                }
            })))
            .mount(&server)
            .await;

        let point = provider_for(&server).current(55.7, 37.6).await.unwrap();
        assert_eq!(point.pressure_hpa, 1000.0);
    }

    #[tokio::test]
    async fn precipitation_falls_back_to_min_max_mean() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "fact": {
                    "temp": 1.0,
                    "pressure_mm": 750,
                    "wind_speed": 2.0,
                    "prec_mm_min": 0.2,
                    "prec_mm_max": 0.6
                }
            })))
            .mount(&server)
            .await;

        let point = provider_for(&server).current(55.7, 37.6).await.unwrap();
        assert!((point.precipitation_mm - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_fact_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "now": 1_690_000_000_i64
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).current(55.7, 37.6).await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { .. }));
    }

    #[tokio::test]
    async fn quota_status_maps_to_quota_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let err = provider_for(&server).current(55.7, 37.6).await.unwrap_err();
        assert!(err.is_quota());
    }

    #[tokio::test]
    async fn hourly_builds_timestamps_from_date_and_hour() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("hours", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "forecasts": [{
                    "date": "2023-10-10",
                    "hours": [
                        {"hour": "0", "temp": 5.0, "pressure_mm": 750, "wind_speed": 1.0},
                        {"hour": "1", "temp": 6.0, "pressure_mm": 751, "wind_speed": 2.0}
                    ]
                }]
            })))
            .mount(&server)
            .await;

        let points = provider_for(&server).hourly(55.7, 37.6, 24).await.unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].observed_at.to_rfc3339(), "2023-10-10T00:00:00+00:00");
        assert_eq!(points[1].observed_at.to_rfc3339(), "2023-10-10T01:00:00+00:00");
        assert_eq!(points[1].temperature_c, 6.0);
    }

    #[tokio::test]
    async fn daily_uses_day_part_fallback_chain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "forecasts": [{
                    "date": "2023-10-10",
                    "parts": {
                        "day_short": {
                            "temp_avg": 9.5,
                            "pressure_pa": 101_000,
                            "wind_speed": 4.0
                        }
                    }
                }]
            })))
            .mount(&server)
            .await;

        let points = provider_for(&server).daily(55.7, 37.6, 7).await.unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].temperature_c, 9.5);
        assert_eq!(points[0].pressure_hpa, 1010.0);
        assert_eq!(points[0].observed_at.to_rfc3339(), "2023-10-10T00:00:00+00:00");
    }
}
