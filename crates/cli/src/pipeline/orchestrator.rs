//! Pipeline orchestrator - coordinates all components.
//!
//! Runs entirely against mock transports: a synthetic radar source and a
//! camera responder wired through the same intake and correlation paths a
//! live broker would use.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use contracts::{
    AirportWeather, Channel, ConsolidatedEvent, LocalWeather, MessageCallback, MessageSource,
    SiteBlueprint, WeatherSnapshot,
};
use correlation::{Consolidator, Correlator, WeatherCache};
use dispatcher::DispatcherConfig;
use ingestion::{BackpressureConfig, MessageIntake, MockCameraConfig, MockCameraResponder,
    MockRadarConfig, MockRadarSource};
use observability::{record_event_metrics, record_pending_depth};
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The site blueprint configuration
    pub blueprint: SiteBlueprint,

    /// Maximum number of consolidated events to produce (None = unlimited)
    pub max_events: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Channel buffer size
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline to completion
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Mock transports from the simulation section
        info!(
            radar_rate_hz = blueprint.simulation.radar_rate_hz,
            camera_latency_ms = blueprint.simulation.camera_latency_ms,
            "Running in simulation mode (no live transports required)"
        );

        let radar_source = MockRadarSource::new(MockRadarConfig {
            rate_hz: blueprint.simulation.radar_rate_hz,
            ..Default::default()
        });
        let camera = Arc::new(MockCameraResponder::new(MockCameraConfig {
            latency_ms: blueprint.simulation.camera_latency_ms,
            drop_probability: blueprint.simulation.camera_drop_probability,
            duplicate_probability: blueprint.simulation.camera_duplicate_probability,
            empty_probability: blueprint.simulation.camera_empty_probability,
        }));

        // Setup Intake
        info!("Setting up message intake...");
        let mut intake = MessageIntake::new(BackpressureConfig::new(
            blueprint.ingest.channel_capacity,
            blueprint.ingest.drop_policy,
        ));
        intake.register_source(Box::new(radar_source));
        intake.register_source(Box::new(SharedSource(camera.clone())));

        let radar_rx = intake
            .take_radar_receiver()
            .context("Failed to get radar receiver")?;
        let camera_rx = intake
            .take_camera_receiver()
            .context("Failed to get camera receiver")?;

        // Setup Correlator
        info!("Configuring correlator...");
        let (outcome_tx, outcome_rx) = mpsc::channel(self.config.buffer_size);
        let correlator = Arc::new(Correlator::new(
            &blueprint.correlator,
            blueprint.site.zone.clone(),
            camera.clone(),
            outcome_tx,
        ));
        let correlator_metrics = correlator.metrics();

        info!(
            camera_timeout_ms = blueprint.correlator.camera_timeout_ms,
            max_pending = blueprint.correlator.max_pending,
            "Correlator configured"
        );

        // Setup Weather cache with a synthetic feed
        let weather_cache = Arc::new(WeatherCache::new(blueprint.weather.cache_capacity));
        let weather_task = spawn_weather_feed(weather_cache.clone());

        // Setup Consolidator
        let consolidator = Arc::new(Consolidator::new(weather_cache, &blueprint.weather));
        let (event_tx, mut event_rx) = mpsc::channel::<ConsolidatedEvent>(self.config.buffer_size);

        // Setup Dispatcher
        info!("Setting up dispatcher...");
        let (dispatch_tx, dispatch_rx) =
            mpsc::channel::<ConsolidatedEvent>(self.config.buffer_size);

        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - consolidated events will be dropped");
        }

        let dispatcher_config = DispatcherConfig {
            sinks: blueprint.sinks.clone(),
        };
        let (dispatcher_handle, _sink_metrics) =
            dispatcher::create_dispatcher(dispatcher_config, dispatch_rx)
                .await
                .context("Failed to create dispatcher")?;

        let active_sinks = blueprint.sinks.len();
        info!(active_sinks, "Dispatcher started");

        // Start the stages
        let correlator_task = {
            let correlator = correlator.clone();
            tokio::spawn(async move { correlator.run(radar_rx, camera_rx).await })
        };
        let consolidator_task = {
            let consolidator = consolidator.clone();
            tokio::spawn(async move { consolidator.run(outcome_rx, event_tx).await })
        };

        // Sample the pending-table depth for the Prometheus gauge and
        // watch the detection counter for a silent radar intake.
        let depth_task = {
            let correlator = correlator.clone();
            let metrics = correlator_metrics.clone();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(Duration::from_secs(1));
                let mut stall_watch = StallWatch::new(INTAKE_STALL_SECS);
                loop {
                    tick.tick().await;
                    record_pending_depth(correlator.pending_len());
                    if stall_watch.observe(metrics.snapshot().detections) {
                        warn!(
                            idle_secs = INTAKE_STALL_SECS,
                            "no radar detections received; radar intake may be stalled"
                        );
                    }
                }
            })
        };

        info!("Starting sensor intake...");
        intake.start_all();

        let max_events = self.config.max_events;
        info!(max_events = ?max_events, "Pipeline running");

        // Pipeline processing task
        let pipeline_task = async move {
            let mut stats = PipelineStats {
                active_sinks,
                ..Default::default()
            };

            while let Some(event) = event_rx.recv().await {
                stats.events_consolidated += 1;

                record_event_metrics(&event);
                stats.fusion_metrics.update(&event);

                info!(
                    correlation_id = %event.correlation_id,
                    sequence = event.sequence,
                    vehicle_type = %event.vehicle_type,
                    camera_status = %event.camera_status.as_str(),
                    speed = format!("{:.1}", event.radar.speed),
                    weather = event.weather.is_some(),
                    "Consolidated event produced"
                );

                if dispatch_tx.send(event).await.is_err() {
                    warn!("Dispatcher channel closed");
                    break;
                }

                // Check max events limit
                if let Some(max) = max_events {
                    if stats.events_consolidated >= max {
                        info!(events = stats.events_consolidated, "Reached max events limit");
                        break;
                    }
                }
            }

            stats
        };

        // Run with optional timeout
        let stats = if let Some(timeout) = self.config.timeout {
            match tokio::time::timeout(timeout, pipeline_task).await {
                Ok(stats) => stats,
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "Pipeline timed out");
                    PipelineStats::default()
                }
            }
        } else {
            pipeline_task.await
        };

        // Shutdown
        info!("Shutting down pipeline...");
        intake.stop_all();
        drop(intake);
        weather_task.abort();
        depth_task.abort();

        // Intake channels are closed; the correlator drains and exits,
        // then the consolidator follows when the outcome side closes.
        let _ = tokio::time::timeout(Duration::from_secs(5), correlator_task).await;
        drop(correlator);
        let _ = tokio::time::timeout(Duration::from_secs(5), consolidator_task).await;

        // Wait for dispatcher to flush
        let _ = tokio::time::timeout(Duration::from_secs(5), dispatcher_handle).await;

        let snapshot = correlator_metrics.snapshot();
        let mut final_stats = stats;
        final_stats.detections_received = snapshot.detections;
        final_stats.matched = snapshot.matched;
        final_stats.timed_out = snapshot.timed_out;
        final_stats.evicted = snapshot.evicted;
        final_stats.orphan_responses = snapshot.orphan_responses;
        final_stats.duration = start_time.elapsed();

        info!(
            duration_secs = final_stats.duration.as_secs_f64(),
            eps = format!("{:.2}", final_stats.eps()),
            "Pipeline shutdown complete"
        );

        Ok(final_stats)
    }
}

/// Adapter so one shared responder can be registered as an intake source
/// while also serving as the camera-request publisher.
struct SharedSource<S>(Arc<S>);

impl<S: MessageSource> MessageSource for SharedSource<S> {
    fn channel(&self) -> Channel {
        self.0.channel()
    }

    fn listen(&self, callback: MessageCallback) {
        self.0.listen(callback)
    }

    fn stop(&self) {
        self.0.stop()
    }

    fn is_listening(&self) -> bool {
        self.0.is_listening()
    }
}

/// Seconds of flat detection counter before the intake is flagged as
/// possibly stalled.
const INTAKE_STALL_SECS: u32 = 10;

/// Flags a counter that stops advancing.
///
/// Distinguishes ordinary silence from a dead radar intake: the mock
/// source emits continuously, so a flat detection counter means the
/// intake side stopped delivering.
struct StallWatch {
    last_count: u64,
    idle_ticks: u32,
    threshold: u32,
}

impl StallWatch {
    fn new(threshold: u32) -> Self {
        Self {
            last_count: 0,
            idle_ticks: 0,
            threshold,
        }
    }

    /// Record one observation; true when the count has stayed flat for
    /// `threshold` consecutive observations. Resets after firing so a
    /// persistent stall keeps being reported.
    fn observe(&mut self, count: u64) -> bool {
        if count != self.last_count {
            self.last_count = count;
            self.idle_ticks = 0;
            return false;
        }
        self.idle_ticks += 1;
        if self.idle_ticks >= self.threshold {
            self.idle_ticks = 0;
            true
        } else {
            false
        }
    }
}

/// Feed the cache with synthetic weather observations.
///
/// Records one snapshot immediately so the earliest events are already
/// enriched, then refreshes periodically with a small random walk.
fn spawn_weather_feed(cache: Arc<WeatherCache>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut temperature_c: f64 = 18.0;
        let mut humidity_pct: f64 = 60.0;

        loop {
            {
                let mut rng = rand::rng();
                temperature_c += rng.random_range(-0.5..0.5);
                humidity_pct = (humidity_pct + rng.random_range(-2.0..2.0)).clamp(20.0, 100.0);
            }

            cache.record(WeatherSnapshot {
                local: LocalWeather {
                    temperature_c,
                    humidity_pct,
                },
                airport: Some(AirportWeather {
                    temperature_c: temperature_c - 1.2,
                    wind_speed_kts: 8.0,
                    wind_direction_deg: 270.0,
                    description: "scattered clouds".to_string(),
                }),
                observed_at: Utc::now(),
            });

            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::WeatherProvider;

    #[tokio::test]
    async fn test_weather_feed_seeds_cache_immediately() {
        let cache = Arc::new(WeatherCache::new(4));
        let feed = spawn_weather_feed(cache.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let snapshot = cache
            .nearest(Utc::now(), chrono::Duration::minutes(1))
            .expect("feed records a snapshot at startup");
        assert!((20.0..=100.0).contains(&snapshot.local.humidity_pct));
        assert!(snapshot.airport.is_some());

        feed.abort();
    }

    #[test]
    fn test_stall_watch_flags_flat_counter() {
        let mut watch = StallWatch::new(2);
        assert!(!watch.observe(5)); // progress from the initial zero
        assert!(!watch.observe(5));
        assert!(watch.observe(5));
        // Resets after firing, then fires again while still flat.
        assert!(!watch.observe(5));
        assert!(watch.observe(5));
    }

    #[test]
    fn test_stall_watch_resets_on_progress() {
        let mut watch = StallWatch::new(2);
        assert!(!watch.observe(1));
        assert!(!watch.observe(1));
        assert!(!watch.observe(2));
        assert!(!watch.observe(2));
        assert!(watch.observe(2));
    }
}
