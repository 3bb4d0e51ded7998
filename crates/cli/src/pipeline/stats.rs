//! Pipeline statistics and metrics.

use std::time::Duration;

use observability::FusionMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total consolidated events produced
    pub events_consolidated: u64,

    /// Total radar triggers processed by the correlator
    pub detections_received: u64,

    /// Correlations resolved by a camera response
    pub matched: u64,

    /// Correlations resolved by deadline expiry
    pub timed_out: u64,

    /// Correlations force-expired by the pending bound
    pub evicted: u64,

    /// Camera responses with no live correlation
    pub orphan_responses: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Number of sinks that received events
    pub active_sinks: usize,

    /// Per-event metrics aggregator
    pub fusion_metrics: FusionMetricsAggregator,
}

impl PipelineStats {
    /// Calculate events per second throughput
    pub fn eps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.events_consolidated as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Calculate match rate as percentage
    #[allow(dead_code)]
    pub fn match_rate(&self) -> f64 {
        if self.events_consolidated > 0 {
            (self.matched as f64 / self.events_consolidated as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Events consolidated: {}", self.events_consolidated);
        println!("   ├─ Detections received: {}", self.detections_received);
        println!("   ├─ Events/s: {:.2}", self.eps());
        println!("   └─ Active sinks: {}", self.active_sinks);

        println!("\n📈 Correlation");
        println!("   ├─ Matched: {}", self.matched);
        println!("   ├─ Timed out: {}", self.timed_out);
        println!("   ├─ Evicted: {}", self.evicted);
        println!("   └─ Orphan responses: {}", self.orphan_responses);

        let summary = self.fusion_metrics.summary();

        println!("\n🚗 Events");
        println!("   ├─ Match rate: {:.2}%", summary.match_rate);
        println!("   ├─ Speed (km/h): {}", summary.speed_kmh);
        println!("   ├─ Latency (ms): {}", summary.latency_ms);
        println!("   └─ With weather: {}", summary.with_weather);

        if !summary.vehicle_type_counts.is_empty() {
            println!("\n🏷  Vehicle Types");
            for (vehicle_type, count) in &summary.vehicle_type_counts {
                println!("   ├─ {}: {}", vehicle_type, count);
            }
        }

        println!();
    }
}
