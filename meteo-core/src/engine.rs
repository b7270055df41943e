//! Resolution orchestrator: local-override gate, cache lookup, ordered
//! provider fallback, cache store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::{
    cache::{Clock, SystemClock, TtlCache, fingerprint},
    config::Config,
    error::{ProviderError, ResolveError},
    model::{QueryKind, WeatherPoint},
    provider::{self, ProviderId, WeatherProvider},
    station::LocalStation,
};

/// Per-kind cache lifetimes. Forecast responses change slower than
/// current observations, so they live longer.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub current: Duration,
    pub forecast: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            current: Duration::from_secs(600),
            forecast: Duration::from_secs(1800),
        }
    }
}

impl CacheTtls {
    fn for_kind(&self, kind: QueryKind) -> Duration {
        if kind.is_forecast() { self.forecast } else { self.current }
    }
}

#[derive(Debug, Clone)]
enum CachedWeather {
    Point(WeatherPoint),
    Series(Vec<WeatherPoint>),
}

/// Resolves weather for coordinates through an ordered provider chain.
///
/// Construct one instance at startup and pass it by reference to request
/// handlers; provider order is fixed at construction and never reordered
/// per request. Resolution per call: local station (when fresh) → cache →
/// providers in priority order, first success wins and is cached.
pub struct WeatherEngine {
    providers: Vec<Box<dyn WeatherProvider>>,
    station: Option<Box<dyn LocalStation>>,
    cache: TtlCache<CachedWeather>,
    ttls: CacheTtls,
}

impl WeatherEngine {
    pub fn new(providers: Vec<Box<dyn WeatherProvider>>, ttls: CacheTtls) -> Self {
        Self::with_clock(providers, ttls, Arc::new(SystemClock))
    }

    /// Same as [`new`](Self::new) with an explicit cache clock, so tests
    /// can drive expiry without sleeping.
    pub fn with_clock(
        providers: Vec<Box<dyn WeatherProvider>>,
        ttls: CacheTtls,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            providers,
            station: None,
            cache: TtlCache::with_clock(clock),
            ttls,
        }
    }

    /// Assemble the engine from configuration: provider chain in priority
    /// order plus configured cache TTLs.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let providers = provider::providers_from_config(config)?;
        Ok(Self::new(providers, config.cache_ttls()))
    }

    /// Attach a local station that preempts remote resolution while its
    /// data is fresh.
    pub fn with_station(mut self, station: Box<dyn LocalStation>) -> Self {
        self.station = Some(station);
        self
    }

    /// Drop every cached entry.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    #[cfg(test)]
    fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub async fn get_current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherPoint, ResolveError> {
        let kind = QueryKind::Current;

        if let Some(station) = self.fresh_station(kind) {
            match station.current(latitude, longitude).await {
                Ok(point) => return Ok(point),
                Err(err) => error!("local station error: {err:#}"),
            }
        }

        let key = fingerprint(kind, latitude, longitude, None);
        if let Some(CachedWeather::Point(point)) = self.cache.get(&key) {
            return Ok(point);
        }

        let mut first_error = None;
        for provider in self.capable(kind) {
            match provider.current(latitude, longitude).await {
                Ok(point) => {
                    self.cache.set(
                        key,
                        CachedWeather::Point(point.clone()),
                        self.ttls.for_kind(kind),
                    );
                    return Ok(point);
                }
                Err(err) => self.note_failure(provider.id(), &mut first_error, err),
            }
        }

        Err(ResolveError::all_failed(kind, first_error))
    }

    pub async fn get_hourly(
        &self,
        latitude: f64,
        longitude: f64,
        hours: u32,
    ) -> Result<Vec<WeatherPoint>, ResolveError> {
        let kind = QueryKind::Hourly;

        if let Some(station) = self.fresh_station(kind) {
            match station.hourly(latitude, longitude, hours).await {
                Ok(points) => return Ok(points),
                Err(err) => error!("local station error: {err:#}"),
            }
        }

        let key = fingerprint(kind, latitude, longitude, Some(hours));
        if let Some(CachedWeather::Series(points)) = self.cache.get(&key) {
            return Ok(points);
        }

        let mut first_error = None;
        for provider in self.capable(kind) {
            match provider.hourly(latitude, longitude, hours).await {
                Ok(points) => {
                    self.cache.set(
                        key,
                        CachedWeather::Series(points.clone()),
                        self.ttls.for_kind(kind),
                    );
                    return Ok(points);
                }
                Err(err) => self.note_failure(provider.id(), &mut first_error, err),
            }
        }

        Err(ResolveError::all_failed(kind, first_error))
    }

    pub async fn get_daily(
        &self,
        latitude: f64,
        longitude: f64,
        days: u32,
    ) -> Result<Vec<WeatherPoint>, ResolveError> {
        let kind = QueryKind::Daily;

        if let Some(station) = self.fresh_station(kind) {
            match station.daily(latitude, longitude, days).await {
                Ok(points) => return Ok(points),
                Err(err) => error!("local station error: {err:#}"),
            }
        }

        let key = fingerprint(kind, latitude, longitude, Some(days));
        if let Some(CachedWeather::Series(points)) = self.cache.get(&key) {
            return Ok(points);
        }

        let mut first_error = None;
        for provider in self.capable(kind) {
            match provider.daily(latitude, longitude, days).await {
                Ok(points) => {
                    self.cache.set(
                        key,
                        CachedWeather::Series(points.clone()),
                        self.ttls.for_kind(kind),
                    );
                    return Ok(points);
                }
                Err(err) => self.note_failure(provider.id(), &mut first_error, err),
            }
        }

        Err(ResolveError::all_failed(kind, first_error))
    }

    /// The station, when one is attached and fresh for this kind. Station
    /// results bypass the cache entirely and are not re-cached.
    fn fresh_station(&self, kind: QueryKind) -> Option<&dyn LocalStation> {
        let station = self.station.as_deref()?;
        station.is_fresh(kind).then_some(station)
    }

    fn capable(&self, kind: QueryKind) -> impl Iterator<Item = &dyn WeatherProvider> {
        self.providers
            .iter()
            .map(|p| p.as_ref())
            .filter(move |p| p.capabilities().contains(&kind))
    }

    fn note_failure(
        &self,
        id: ProviderId,
        first_error: &mut Option<ProviderError>,
        err: ProviderError,
    ) {
        if err.is_quota() {
            warn!(provider = %id, "provider quota exceeded: {err}");
        } else {
            error!(provider = %id, "provider failed: {err}");
        }
        first_error.get_or_insert(err);
    }
}
