//! Local-override gate: a co-located data source (e.g. an on-site
//! station) that preempts remote resolution entirely while its data is
//! fresh.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::model::{QueryKind, WeatherPoint};

/// Contract for a preferred local data source.
///
/// The engine consults [`is_fresh`](LocalStation::is_fresh) before every
/// resolution; when it reports `true` the station answers directly,
/// bypassing the cache and all remote providers. Errors returned here are
/// treated as "local unavailable" and resolution falls through to the
/// normal cache/provider flow — they are never surfaced to callers.
#[async_trait]
pub trait LocalStation: Send + Sync + Debug {
    /// Whether the station holds data fresh enough to answer queries of
    /// this kind.
    fn is_fresh(&self, kind: QueryKind) -> bool;

    async fn current(&self, latitude: f64, longitude: f64) -> anyhow::Result<WeatherPoint>;

    async fn hourly(
        &self,
        latitude: f64,
        longitude: f64,
        hours: u32,
    ) -> anyhow::Result<Vec<WeatherPoint>>;

    async fn daily(
        &self,
        latitude: f64,
        longitude: f64,
        days: u32,
    ) -> anyhow::Result<Vec<WeatherPoint>>;
}
