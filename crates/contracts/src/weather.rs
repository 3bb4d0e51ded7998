//! Weather reference data and the cache lookup seam.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Ambient weather context attached to consolidated events.
///
/// Read-only reference data from the core's perspective; the external
/// weather collaborator owns its production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// On-site sensor readings
    pub local: LocalWeather,

    /// Nearest airport METAR-derived readings, when available
    pub airport: Option<AirportWeather>,

    /// When the readings were taken
    pub observed_at: DateTime<Utc>,
}

/// On-site temperature/humidity probe readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalWeather {
    pub temperature_c: f64,
    pub humidity_pct: f64,
}

/// Remote (airport) weather readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirportWeather {
    pub temperature_c: f64,
    pub wind_speed_kts: f64,
    pub wind_direction_deg: f64,
    pub description: String,
}

/// Weather lookup interface consumed by the Consolidator.
///
/// Implementations must be cheap and non-blocking; the Consolidator calls
/// this on its run loop for every event.
pub trait WeatherProvider: Send + Sync {
    /// Freshest snapshot observed at or before `at`, provided it is no
    /// older than `max_staleness`. Returns `None` rather than stale data.
    fn nearest(&self, at: DateTime<Utc>, max_staleness: Duration) -> Option<WeatherSnapshot>;
}
