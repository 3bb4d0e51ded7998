//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    site: SiteInfo,
    correlator: CorrelatorInfo,
    weather: WeatherInfo,
    simulation: SimulationInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SiteInfo {
    id: String,
    zone: String,
}

#[derive(Serialize)]
struct CorrelatorInfo {
    camera_timeout_ms: u64,
    max_pending: usize,
}

#[derive(Serialize)]
struct WeatherInfo {
    staleness_ms: u64,
    cache_capacity: usize,
}

#[derive(Serialize)]
struct SimulationInfo {
    radar_rate_hz: f64,
    camera_latency_ms: u64,
    camera_drop_probability: f64,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    max_attempts: u32,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &contracts::SiteBlueprint, args: &InfoArgs) -> ConfigInfo {
    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
                max_attempts: s.retry.max_attempts,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        site: SiteInfo {
            id: blueprint.site.id.clone(),
            zone: blueprint.site.zone.clone(),
        },
        correlator: CorrelatorInfo {
            camera_timeout_ms: blueprint.correlator.camera_timeout_ms,
            max_pending: blueprint.correlator.max_pending,
        },
        weather: WeatherInfo {
            staleness_ms: blueprint.weather.staleness_ms,
            cache_capacity: blueprint.weather.cache_capacity,
        },
        simulation: SimulationInfo {
            radar_rate_hz: blueprint.simulation.radar_rate_hz,
            camera_latency_ms: blueprint.simulation.camera_latency_ms,
            camera_drop_probability: blueprint.simulation.camera_drop_probability,
        },
        sinks,
    }
}

fn print_config_info(blueprint: &contracts::SiteBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              Traffic Fusion Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // Site info
    println!("📍 Site");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Id: {}", blueprint.site.id);
    println!("   └─ Zone: {}", blueprint.site.zone);

    // Correlator
    println!("\n⚙️  Correlator");
    println!(
        "   ├─ Camera timeout: {} ms",
        blueprint.correlator.camera_timeout_ms
    );
    println!("   └─ Max pending: {}", blueprint.correlator.max_pending);

    // Weather
    println!("\n🌤  Weather");
    println!("   ├─ Staleness: {} ms", blueprint.weather.staleness_ms);
    println!(
        "   └─ Cache capacity: {}",
        blueprint.weather.cache_capacity
    );

    // Simulation
    println!("\n🎛  Simulation");
    println!(
        "   ├─ Radar rate: {} Hz",
        blueprint.simulation.radar_rate_hz
    );
    println!(
        "   ├─ Camera latency: {} ms",
        blueprint.simulation.camera_latency_ms
    );
    println!(
        "   └─ Camera drop probability: {}",
        blueprint.simulation.camera_drop_probability
    );

    // Sinks
    if !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let is_last = i == blueprint.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            if args.sinks {
                println!(
                    "   {} {} ({:?}, queue={}, attempts={})",
                    prefix, sink.name, sink.sink_type, sink.queue_capacity, sink.retry.max_attempts
                );
            } else {
                println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
            }
        }
    }

    println!();
}
