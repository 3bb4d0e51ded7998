//! Fusion pipeline metrics collection
//!
//! Records per-event metrics from ConsolidatedEvent and aggregates
//! summary statistics for end-of-run reporting.

use contracts::{CameraStatus, ConsolidatedEvent};
use metrics::{counter, gauge, histogram};

/// Record metrics for one consolidated event
///
/// Call this for every event emitted by the consolidation stage.
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_event_metrics;
///
/// while let Some(event) = event_rx.recv().await {
///     record_event_metrics(&event);
///     // ...
/// }
/// ```
pub fn record_event_metrics(event: &ConsolidatedEvent) {
    // Event counter
    counter!("traffic_fusion_events_total").increment(1);

    // Sequence number (for detecting gaps)
    gauge!("traffic_fusion_last_sequence").set(event.sequence as f64);

    // Camera handshake outcome
    counter!(
        "traffic_fusion_camera_status_total",
        "status" => event.camera_status.as_str()
    )
    .increment(1);

    // Vehicle classification
    counter!(
        "traffic_fusion_vehicle_type_total",
        "vehicle_type" => event.vehicle_type.clone()
    )
    .increment(1);

    // Measured speed
    histogram!("traffic_fusion_speed_kmh").record(event.radar.speed);

    // Time from radar trigger to consolidation
    let latency_ms = (event.created_at - event.radar.detected_at).num_milliseconds();
    if latency_ms >= 0 {
        histogram!("traffic_fusion_correlation_latency_ms").record(latency_ms as f64);
    }

    // Classification confidence
    if let Some(camera) = &event.camera {
        histogram!("traffic_fusion_camera_confidence").record(camera.confidence);
    }

    // Weather enrichment coverage
    if event.weather.is_some() {
        counter!("traffic_fusion_events_with_weather_total").increment(1);
    }
}

/// Record pending correlation table depth
pub fn record_pending_depth(depth: usize) {
    gauge!("traffic_fusion_pending_depth").set(depth as f64);
}

/// Fusion metrics aggregator
///
/// Aggregates in memory for summary output at shutdown.
#[derive(Debug, Clone, Default)]
pub struct FusionMetricsAggregator {
    /// Total consolidated events
    pub total_events: u64,

    /// Events with a matched camera classification
    pub matched: u64,

    /// Events that hit the camera deadline
    pub timed_out: u64,

    /// Events where the camera answered but classified nothing
    pub not_available: u64,

    /// Events carrying a weather snapshot
    pub with_weather: u64,

    /// Speed statistics (km/h)
    pub speed_stats: RunningStats,

    /// Correlation latency statistics (ms)
    pub latency_stats: RunningStats,

    /// Classification confidence statistics
    pub confidence_stats: RunningStats,

    /// Event counts per vehicle type
    pub vehicle_type_counts: std::collections::HashMap<String, u64>,
}

impl FusionMetricsAggregator {
    /// Create a new aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Update aggregate statistics with one event
    pub fn update(&mut self, event: &ConsolidatedEvent) {
        self.total_events += 1;

        match event.camera_status {
            CameraStatus::Matched => self.matched += 1,
            CameraStatus::TimedOut => self.timed_out += 1,
            CameraStatus::NotAvailable => self.not_available += 1,
        }

        if event.weather.is_some() {
            self.with_weather += 1;
        }

        self.speed_stats.push(event.radar.speed);

        let latency_ms = (event.created_at - event.radar.detected_at).num_milliseconds();
        if latency_ms >= 0 {
            self.latency_stats.push(latency_ms as f64);
        }

        if let Some(camera) = &event.camera {
            self.confidence_stats.push(camera.confidence);
        }

        *self
            .vehicle_type_counts
            .entry(event.vehicle_type.clone())
            .or_insert(0) += 1;
    }

    /// Build a summary report
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_events: self.total_events,
            matched: self.matched,
            timed_out: self.timed_out,
            not_available: self.not_available,
            with_weather: self.with_weather,
            match_rate: if self.total_events > 0 {
                self.matched as f64 / self.total_events as f64 * 100.0
            } else {
                0.0
            },
            timeout_rate: if self.total_events > 0 {
                self.timed_out as f64 / self.total_events as f64 * 100.0
            } else {
                0.0
            },
            speed_kmh: StatsSummary::from(&self.speed_stats),
            latency_ms: StatsSummary::from(&self.latency_stats),
            confidence: StatsSummary::from(&self.confidence_stats),
            vehicle_type_counts: self.vehicle_type_counts.clone(),
        }
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_events: u64,
    pub matched: u64,
    pub timed_out: u64,
    pub not_available: u64,
    pub with_weather: u64,
    pub match_rate: f64,
    pub timeout_rate: f64,
    pub speed_kmh: StatsSummary,
    pub latency_ms: StatsSummary,
    pub confidence: StatsSummary,
    pub vehicle_type_counts: std::collections::HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Fusion Metrics Summary ===")?;
        writeln!(f, "Total events: {}", self.total_events)?;
        writeln!(f, "Matched: {} ({:.2}%)", self.matched, self.match_rate)?;
        writeln!(
            f,
            "Timed out: {} ({:.2}%)",
            self.timed_out, self.timeout_rate
        )?;
        writeln!(f, "Not available: {}", self.not_available)?;
        writeln!(f, "With weather: {}", self.with_weather)?;
        writeln!(f, "Speed (km/h): {}", self.speed_kmh)?;
        writeln!(f, "Correlation latency (ms): {}", self.latency_ms)?;
        writeln!(f, "Confidence: {}", self.confidence)?;

        if !self.vehicle_type_counts.is_empty() {
            writeln!(f, "Vehicle type counts:")?;
            for (vehicle_type, count) in &self.vehicle_type_counts {
                writeln!(f, "  {}: {}", vehicle_type, count)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a new value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Sample count
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Minimum
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Maximum
    pub fn max(&self) -> f64 {
        self.max
    }
}
