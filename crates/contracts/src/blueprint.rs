//! SiteBlueprint - Config Loader output
//!
//! Describes the full site configuration: identity, correlation tuning,
//! weather enrichment, intake backpressure, simulation knobs, output routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete site configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Site identity
    pub site: SiteConfig,

    /// Correlation tuning
    #[serde(default)]
    pub correlator: CorrelatorConfig,

    /// Weather enrichment tuning
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Intake backpressure tuning
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Mock transport tuning (transport-free runs)
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Output routing configuration
    pub sinks: Vec<SinkConfig>,
}

/// Site identity: installation id and monitored zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Installation identifier (e.g., "site-042")
    pub id: String,

    /// Monitored zone, carried on camera requests
    pub zone: String,
}

/// Correlation tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatorConfig {
    /// Camera-response wait deadline in milliseconds
    pub camera_timeout_ms: u64,

    /// Maximum live pending correlations before oldest-first eviction
    pub max_pending: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            camera_timeout_ms: 3000,
            max_pending: 500,
        }
    }
}

/// Weather enrichment tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Maximum snapshot age in milliseconds before it is treated as absent
    pub staleness_ms: u64,

    /// Cached snapshot ring capacity
    pub cache_capacity: usize,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            staleness_ms: 900_000,
            cache_capacity: 64,
        }
    }
}

/// Intake backpressure tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Bounded channel capacity between transport callbacks and the core
    pub channel_capacity: usize,

    /// Policy when an intake channel is full
    #[serde(default)]
    pub drop_policy: DropPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            drop_policy: DropPolicy::default(),
        }
    }
}

/// Drop policy under backpressure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Drop the oldest queued payload
    #[default]
    DropOldest,
    /// Drop the newest (incoming) payload
    DropNewest,
}

/// Mock transport tuning for transport-free runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Mock radar trigger rate (Hz)
    pub radar_rate_hz: f64,

    /// Mock camera round-trip latency in milliseconds
    pub camera_latency_ms: u64,

    /// Probability a mock camera response is silently dropped
    pub camera_drop_probability: f64,

    /// Probability a mock camera response is delivered twice
    pub camera_duplicate_probability: f64,

    /// Probability a mock camera response carries no classifications
    pub camera_empty_probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            radar_rate_hz: 2.0,
            camera_latency_ms: 300,
            camera_drop_probability: 0.05,
            camera_duplicate_probability: 0.02,
            camera_empty_probability: 0.02,
        }
    }
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name (unique within the blueprint)
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Per-sink delivery queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Delivery retry tuning
    #[serde(default)]
    pub retry: RetryConfig,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    1000
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// File output (JSON lines)
    File,
    /// Network output (UDP)
    Udp,
}

/// Delivery retry tuning (exponential backoff)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delivery attempts per event before it is abandoned
    pub max_attempts: u32,

    /// First backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Backoff ceiling in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 50,
            max_backoff_ms: 2000,
        }
    }
}

impl RetryConfig {
    /// Backoff delay for the given zero-based attempt, capped at the ceiling.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let shifted = self
            .initial_backoff_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        shifted.min(self.max_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blueprint() -> SiteBlueprint {
        SiteBlueprint {
            version: ConfigVersion::V1,
            site: SiteConfig {
                id: "site-042".into(),
                zone: "nb-lane-1".into(),
            },
            correlator: CorrelatorConfig::default(),
            weather: WeatherConfig::default(),
            ingest: IngestConfig::default(),
            simulation: SimulationConfig::default(),
            sinks: vec![SinkConfig {
                name: "primary-log".into(),
                sink_type: SinkType::Log,
                queue_capacity: default_queue_capacity(),
                retry: RetryConfig::default(),
                params: HashMap::new(),
            }],
        }
    }

    #[test]
    fn defaults_match_tuned_values() {
        let blueprint = sample_blueprint();
        assert_eq!(blueprint.correlator.camera_timeout_ms, 3000);
        assert_eq!(blueprint.correlator.max_pending, 500);
        assert_eq!(blueprint.weather.staleness_ms, 900_000);
        assert_eq!(blueprint.ingest.channel_capacity, 256);
        assert_eq!(blueprint.ingest.drop_policy, DropPolicy::DropOldest);
        assert_eq!(blueprint.sinks[0].queue_capacity, 1000);
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let retry = RetryConfig::default();
        assert_eq!(retry.backoff_ms(0), 50);
        assert_eq!(retry.backoff_ms(1), 100);
        assert_eq!(retry.backoff_ms(2), 200);
        assert_eq!(retry.backoff_ms(10), 2000);
        assert_eq!(retry.backoff_ms(63), 2000);
    }

    #[test]
    fn sections_default_when_omitted() {
        let toml = r#"
            [site]
            id = "site-001"
            zone = "sb-lane-2"

            [[sinks]]
            name = "log"
            sink_type = "log"
        "#;
        let blueprint: SiteBlueprint = toml::from_str(toml).unwrap();
        assert_eq!(blueprint.version, ConfigVersion::V1);
        assert_eq!(blueprint.correlator.camera_timeout_ms, 3000);
        assert_eq!(blueprint.sinks[0].sink_type, SinkType::Log);
        assert_eq!(blueprint.sinks[0].retry.max_attempts, 4);
    }
}
