//! In-process TTL cache bounding outbound provider calls.
//!
//! Expiry is computed at write time and checked lazily at read time; a
//! stale entry is deleted by the read that discovers it. There is no
//! background sweep and no size bound: the coordinate-rounded key space
//! stays small.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::model::QueryKind;

/// Time source for expiry checks. Swappable in tests so TTL behaviour can
/// be exercised without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default wall-clock-backed [`Clock`].
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), clock }
    }

    /// Look up a key, pruning it when it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = lock(&self.entries);

        match entries.get(key) {
            Some(entry) if now > entry.expires_at => {}
            Some(entry) => {
                debug!(key, "cache hit");
                return Some(entry.value.clone());
            }
            None => {
                debug!(key, "cache miss");
                return None;
            }
        }

        debug!(key, "cache entry expired");
        entries.remove(key);
        None
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        lock(&self.entries).insert(key.into(), Entry { value, expires_at });
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

// Entries are replaced wholesale, so the map stays consistent even after
// a poisoned lock.
fn lock<V>(
    entries: &Mutex<HashMap<String, Entry<V>>>,
) -> MutexGuard<'_, HashMap<String, Entry<V>>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cache key for a resolution request. Coordinates are rounded to four
/// decimal places so nearby requests coalesce into one slot; the optional
/// extra parameter (forecast horizon) becomes a trailing segment.
pub fn fingerprint(kind: QueryKind, latitude: f64, longitude: f64, extra: Option<u32>) -> String {
    match extra {
        Some(extra) => format!("weather:{kind}:{latitude:.4}:{longitude:.4}:{extra}"),
        None => format!("weather:{kind}:{latitude:.4}:{longitude:.4}"),
    }
}
