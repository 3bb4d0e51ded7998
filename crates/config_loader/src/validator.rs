//! Configuration validation.
//!
//! Rules:
//! - site.id and site.zone non-empty
//! - camera_timeout_ms > 0, max_pending > 0
//! - weather.staleness_ms > 0, cache_capacity > 0
//! - ingest.channel_capacity > 0
//! - simulation probabilities within [0, 1], radar_rate_hz > 0
//! - sink names unique and non-empty, queue_capacity > 0, retry.max_attempts >= 1

use std::collections::HashSet;

use contracts::{FusionError, SinkType, SiteBlueprint};

/// Validate a SiteBlueprint.
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &SiteBlueprint) -> Result<(), FusionError> {
    validate_site(blueprint)?;
    validate_correlator(blueprint)?;
    validate_weather(blueprint)?;
    validate_ingest(blueprint)?;
    validate_simulation(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_site(blueprint: &SiteBlueprint) -> Result<(), FusionError> {
    if blueprint.site.id.is_empty() {
        return Err(FusionError::config_validation(
            "site.id",
            "site id cannot be empty",
        ));
    }
    if blueprint.site.zone.is_empty() {
        return Err(FusionError::config_validation(
            "site.zone",
            "zone cannot be empty",
        ));
    }
    Ok(())
}

fn validate_correlator(blueprint: &SiteBlueprint) -> Result<(), FusionError> {
    let correlator = &blueprint.correlator;
    if correlator.camera_timeout_ms == 0 {
        return Err(FusionError::config_validation(
            "correlator.camera_timeout_ms",
            "camera_timeout_ms must be > 0",
        ));
    }
    if correlator.max_pending == 0 {
        return Err(FusionError::config_validation(
            "correlator.max_pending",
            "max_pending must be > 0",
        ));
    }
    Ok(())
}

fn validate_weather(blueprint: &SiteBlueprint) -> Result<(), FusionError> {
    let weather = &blueprint.weather;
    if weather.staleness_ms == 0 {
        return Err(FusionError::config_validation(
            "weather.staleness_ms",
            "staleness_ms must be > 0",
        ));
    }
    if weather.cache_capacity == 0 {
        return Err(FusionError::config_validation(
            "weather.cache_capacity",
            "cache_capacity must be > 0",
        ));
    }
    Ok(())
}

fn validate_ingest(blueprint: &SiteBlueprint) -> Result<(), FusionError> {
    if blueprint.ingest.channel_capacity == 0 {
        return Err(FusionError::config_validation(
            "ingest.channel_capacity",
            "channel_capacity must be > 0",
        ));
    }
    Ok(())
}

fn validate_simulation(blueprint: &SiteBlueprint) -> Result<(), FusionError> {
    let sim = &blueprint.simulation;
    if sim.radar_rate_hz <= 0.0 || !sim.radar_rate_hz.is_finite() {
        return Err(FusionError::config_validation(
            "simulation.radar_rate_hz",
            format!("radar_rate_hz must be > 0, got {}", sim.radar_rate_hz),
        ));
    }

    let probabilities = [
        ("camera_drop_probability", sim.camera_drop_probability),
        (
            "camera_duplicate_probability",
            sim.camera_duplicate_probability,
        ),
        ("camera_empty_probability", sim.camera_empty_probability),
    ];
    for (field, value) in probabilities {
        if !(0.0..=1.0).contains(&value) {
            return Err(FusionError::config_validation(
                format!("simulation.{field}"),
                format!("probability must be within [0, 1], got {value}"),
            ));
        }
    }
    Ok(())
}

fn validate_sinks(blueprint: &SiteBlueprint) -> Result<(), FusionError> {
    if blueprint.sinks.is_empty() {
        return Err(FusionError::config_validation(
            "sinks",
            "at least one sink is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(FusionError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(&sink.name) {
            return Err(FusionError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(FusionError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }
        if sink.retry.max_attempts == 0 {
            return Err(FusionError::config_validation(
                format!("sinks[{}].retry.max_attempts", sink.name),
                "max_attempts must be >= 1",
            ));
        }
        if sink.retry.initial_backoff_ms > sink.retry.max_backoff_ms {
            return Err(FusionError::config_validation(
                format!("sinks[{}].retry", sink.name),
                format!(
                    "initial_backoff_ms ({}) must be <= max_backoff_ms ({})",
                    sink.retry.initial_backoff_ms, sink.retry.max_backoff_ms
                ),
            ));
        }
        validate_sink_params(sink.sink_type, sink, idx)?;
    }
    Ok(())
}

/// Type-specific required params
fn validate_sink_params(
    sink_type: SinkType,
    sink: &contracts::SinkConfig,
    idx: usize,
) -> Result<(), FusionError> {
    match sink_type {
        SinkType::Log => Ok(()),
        SinkType::File => {
            if !sink.params.contains_key("path") {
                return Err(FusionError::config_validation(
                    format!("sinks[{idx}].params.path"),
                    "file sink requires a 'path' parameter",
                ));
            }
            Ok(())
        }
        SinkType::Udp => {
            if !sink.params.contains_key("address") {
                return Err(FusionError::config_validation(
                    format!("sinks[{idx}].params.address"),
                    "udp sink requires an 'address' parameter",
                ));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ConfigVersion, CorrelatorConfig, IngestConfig, RetryConfig, SimulationConfig, SinkConfig,
        SiteConfig, WeatherConfig,
    };

    fn minimal_blueprint() -> SiteBlueprint {
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
                name: "log".into(),
                sink_type: SinkType::Log,
                queue_capacity: 100,
                retry: RetryConfig::default(),
                params: Default::default(),
            }],
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_empty_zone() {
        let mut bp = minimal_blueprint();
        bp.site.zone = String::new();
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("zone cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_zero_camera_timeout() {
        let mut bp = minimal_blueprint();
        bp.correlator.camera_timeout_ms = 0;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("camera_timeout_ms must be > 0"), "got: {err}");
    }

    #[test]
    fn test_probability_out_of_range() {
        let mut bp = minimal_blueprint();
        bp.simulation.camera_drop_probability = 1.5;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("within [0, 1]"), "got: {err}");
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(bp.sinks[0].clone());
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("duplicate sink name"), "got: {err}");
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].name = String::new();
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_no_sinks() {
        let mut bp = minimal_blueprint();
        bp.sinks.clear();
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("at least one sink"), "got: {err}");
    }

    #[test]
    fn test_file_sink_requires_path() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].sink_type = SinkType::File;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("'path'"), "got: {err}");
    }

    #[test]
    fn test_inverted_backoff_range() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].retry.initial_backoff_ms = 5000;
        bp.sinks[0].retry.max_backoff_ms = 100;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("initial_backoff_ms"), "got: {err}");
    }
}
