use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of weather query a caller can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Current,
    Hourly,
    Daily,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Current => "current",
            QueryKind::Hourly => "hourly",
            QueryKind::Daily => "daily",
        }
    }

    /// Forecast kinds share a longer cache TTL than current observations.
    pub fn is_forecast(&self) -> bool {
        matches!(self, QueryKind::Hourly | QueryKind::Daily)
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized weather observation.
///
/// Values are stored in fixed units so providers stay interchangeable:
/// temperature in Celsius, pressure in hectopascals, wind speed in metres
/// per second, precipitation in millimetres. Converting from a provider's
/// native units is the adapter's job and never leaks to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherPoint {
    /// Latitude of the request (echoed, not provider-corrected).
    pub latitude: f64,
    /// Longitude of the request.
    pub longitude: f64,
    pub temperature_c: f64,
    pub pressure_hpa: f64,
    pub wind_speed_ms: f64,
    pub precipitation_mm: f64,
    /// Which provider (or the local station) produced this point.
    pub source: String,
    /// Observation time in UTC; adapters substitute the current time when
    /// the provider omits it.
    pub observed_at: DateTime<Utc>,
}

const MMHG_PER_HPA: f64 = 1.33322;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert a wind speed reported in km/h to m/s.
pub fn kmh_to_ms(kmh: f64) -> f64 {
    round2(kmh / 3.6)
}

/// Convert a pressure reported in mmHg to hPa.
pub fn mmhg_to_hpa(mmhg: f64) -> f64 {
    round2(mmhg * MMHG_PER_HPA)
}

/// Convert a pressure reported in pascals to hPa.
pub fn pa_to_hpa(pa: f64) -> f64 {
    round2(pa / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_as_str_matches_display() {
        for kind in [QueryKind::Current, QueryKind::Hourly, QueryKind::Daily] {
            assert_eq!(kind.as_str(), kind.to_string());
        }
    }

    #[test]
    fn forecast_kinds() {
        assert!(!QueryKind::Current.is_forecast());
        assert!(QueryKind::Hourly.is_forecast());
        assert!(QueryKind::Daily.is_forecast());
    }

    #[test]
    fn wind_kmh_to_ms() {
        assert_eq!(kmh_to_ms(36.0), 10.0);
        assert_eq!(kmh_to_ms(18.0), 5.0);
        assert_eq!(kmh_to_ms(10.0), 2.78);
    }

    #[test]
    fn pressure_mmhg_to_hpa() {
        // 750 mmHg is the reference conversion case: 999.92 hPa.
        assert!((mmhg_to_hpa(750.0) - 999.92).abs() < 0.01);
    }

    #[test]
    fn pressure_pa_to_hpa() {
        assert_eq!(pa_to_hpa(100_000.0), 1000.0);
        assert_eq!(pa_to_hpa(101_325.0), 1013.25);
    }

    #[test]
    fn weather_point_serde_roundtrip() {
        let point = WeatherPoint {
            latitude: 55.7512,
            longitude: 37.6184,
            temperature_c: 12.0,
            pressure_hpa: 999.92,
            wind_speed_ms: 5.0,
            precipitation_mm: 0.4,
            source: "yandex".to_string(),
            observed_at: DateTime::from_timestamp(1_690_000_000, 0).expect("valid timestamp"),
        };

        let json = serde_json::to_string(&point).expect("serialize");
        let back: WeatherPoint = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(point, back);
    }
}
