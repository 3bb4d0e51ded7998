//! Weather cache.
//!
//! Bounded ring of snapshots recorded by the external weather collaborator.
//! Read-only from the core's perspective; the consolidator only ever calls
//! the `WeatherProvider` lookup.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use contracts::{WeatherProvider, WeatherSnapshot};
use tracing::trace;

/// Bounded in-memory weather snapshot cache.
#[derive(Debug)]
pub struct WeatherCache {
    snapshots: Mutex<VecDeque<WeatherSnapshot>>,
    capacity: usize,
}

impl WeatherCache {
    /// Create a cache holding at most `capacity` snapshots.
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Record a snapshot, discarding the oldest when full.
    pub fn record(&self, snapshot: WeatherSnapshot) {
        let Ok(mut snapshots) = self.snapshots.lock() else {
            return;
        };
        if snapshots.len() == self.capacity {
            snapshots.pop_front();
        }
        trace!(observed_at = %snapshot.observed_at, "weather snapshot recorded");
        snapshots.push_back(snapshot);
    }

    /// Number of cached snapshots
    pub fn len(&self) -> usize {
        self.snapshots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WeatherProvider for WeatherCache {
    fn nearest(&self, at: DateTime<Utc>, max_staleness: Duration) -> Option<WeatherSnapshot> {
        let snapshots = self.snapshots.lock().ok()?;
        snapshots
            .iter()
            .filter(|s| s.observed_at <= at)
            .max_by_key(|s| s.observed_at)
            .filter(|s| at - s.observed_at <= max_staleness)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::LocalWeather;

    fn snapshot(observed_at: DateTime<Utc>, temperature_c: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            local: LocalWeather {
                temperature_c,
                humidity_pct: 60.0,
            },
            airport: None,
            observed_at,
        }
    }

    #[test]
    fn test_nearest_picks_freshest_at_or_before() {
        let cache = WeatherCache::new(8);
        let now = Utc::now();
        cache.record(snapshot(now - Duration::minutes(10), 18.0));
        cache.record(snapshot(now - Duration::minutes(2), 19.5));
        cache.record(snapshot(now + Duration::minutes(5), 25.0));

        let hit = cache.nearest(now, Duration::minutes(15)).unwrap();
        assert_eq!(hit.local.temperature_c, 19.5);
    }

    #[test]
    fn test_stale_snapshot_is_absent_not_returned() {
        let cache = WeatherCache::new(8);
        let now = Utc::now();
        cache.record(snapshot(now - Duration::minutes(20), 18.0));

        assert!(cache.nearest(now, Duration::minutes(15)).is_none());
    }

    #[test]
    fn test_empty_cache_returns_none() {
        let cache = WeatherCache::new(8);
        assert!(cache.nearest(Utc::now(), Duration::minutes(15)).is_none());
    }

    #[test]
    fn test_ring_discards_oldest_when_full() {
        let cache = WeatherCache::new(2);
        let now = Utc::now();
        cache.record(snapshot(now - Duration::minutes(3), 1.0));
        cache.record(snapshot(now - Duration::minutes(2), 2.0));
        cache.record(snapshot(now - Duration::minutes(1), 3.0));

        assert_eq!(cache.len(), 2);
        // The oldest (1.0) is gone; the query before the second entry
        // finds nothing at or before it.
        let hit = cache
            .nearest(now - Duration::minutes(2), Duration::minutes(15))
            .unwrap();
        assert_eq!(hit.local.temperature_c, 2.0);
    }
}
