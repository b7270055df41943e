use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::ProviderError,
    model::{QueryKind, WeatherPoint},
    provider::REQUEST_TIMEOUT,
};

use super::{ProviderId, WeatherProvider};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// OpenWeather adapter for the current-weather endpoint. With metric
/// units the response is already in the normalized units (°C, hPa, m/s).
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
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

    async fn fetch_current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherPoint, ProviderError> {
        let res = self
            .http
            .get(&self.base_url)
            .timeout(REQUEST_TIMEOUT)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(ProviderError::from_status(status, &body));
        }

        let parsed: OwCurrentResponse = serde_json::from_str(&body)
            .map_err(|err| ProviderError::malformed(format!("invalid OpenWeather JSON: {err}")))?;

        let precipitation_mm = parsed
            .rain
            .and_then(|rain| rain.one_hour.or(rain.three_hours))
            .unwrap_or(0.0);

        Ok(WeatherPoint {
            latitude,
            longitude,
            temperature_c: parsed.main.temp,
            pressure_hpa: parsed.main.pressure,
            wind_speed_ms: parsed.wind.speed,
            precipitation_mm,
            source: ProviderId::OpenWeather.as_str().to_string(),
            observed_at: parsed
                .dt
                .and_then(unix_to_utc)
                .unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwRain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: Option<i64>,
    main: OwMain,
    wind: OwWind,
    rain: Option<OwRain>,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    fn capabilities(&self) -> &'static [QueryKind] {
        &[QueryKind::Current]
    }

    async fn current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherPoint, ProviderError> {
        self.fetch_current(latitude, longitude).await
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenWeatherProvider {
        OpenWeatherProvider::new("KEY".to_string()).with_base_url(server.uri())
    }

    #[tokio::test]
    async fn current_passes_metric_values_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("appid", "KEY"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "dt": 1_690_000_000,
                "main": {"temp": 21.4, "pressure": 1012.0},
                "wind": {"speed": 3.6},
                "rain": {"1h": 0.3}
            })))
            .mount(&server)
            .await;

        let point = provider_for(&server).current(50.45, 30.52).await.unwrap();

        assert_eq!(point.temperature_c, 21.4);
        assert_eq!(point.pressure_hpa, 1012.0);
        assert_eq!(point.wind_speed_ms, 3.6);
        assert_eq!(point.precipitation_mm, 0.3);
        assert_eq!(point.source, "openweather");
        assert_eq!(point.observed_at, unix_to_utc(1_690_000_000).unwrap());
    }

    #[tokio::test]
    async fn missing_rain_defaults_to_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "dt": 1_690_000_000,
                "main": {"temp": 21.4, "pressure": 1012.0},
                "wind": {"speed": 3.6}
            })))
            .mount(&server)
            .await;

        let point = provider_for(&server).current(50.45, 30.52).await.unwrap();
        assert_eq!(point.precipitation_mm, 0.0);
    }

    #[tokio::test]
    async fn three_hour_rain_is_used_when_one_hour_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "main": {"temp": 10.0, "pressure": 1000.0},
                "wind": {"speed": 1.0},
                "rain": {"3h": 2.1}
            })))
            .mount(&server)
            .await;

        let point = provider_for(&server).current(50.45, 30.52).await.unwrap();
        assert_eq!(point.precipitation_mm, 2.1);
    }

    #[tokio::test]
    async fn quota_status_maps_to_quota_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("limit reached"))
            .mount(&server)
            .await;

        let err = provider_for(&server).current(1.0, 2.0).await.unwrap_err();
        assert!(err.is_quota());
    }

    #[tokio::test]
    async fn missing_required_fields_are_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "main": {"temp": 10.0}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).current(1.0, 2.0).await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { .. }));
    }

    #[tokio::test]
    async fn hourly_is_not_supported() {
        let server = MockServer::start().await;
        let provider = provider_for(&server);

        assert!(!provider.capabilities().contains(&QueryKind::Hourly));
        let err = provider.hourly(1.0, 2.0, 24).await.unwrap_err();
        assert!(err.to_string().contains("does not answer hourly"));
    }
}
