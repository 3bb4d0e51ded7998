//! LogSink - logs event summary via tracing

use contracts::{ConsolidatedEvent, EventSink, FusionError};
use tracing::{info, instrument};

/// Sink that logs event summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_event_summary(&self, event: &ConsolidatedEvent) {
        info!(
            sink = %self.name,
            correlation_id = %event.correlation_id,
            sequence = event.sequence,
            vehicle_type = %event.vehicle_type,
            camera_status = %event.camera_status.as_str(),
            speed = event.radar.speed,
            direction = ?event.radar.direction,
            weather = event.weather.is_some(),
            "ConsolidatedEvent received"
        );
    }
}

impl EventSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, event),
        fields(sink = %self.name, correlation_id = %event.correlation_id)
    )]
    async fn write(&mut self, event: &ConsolidatedEvent) -> Result<(), FusionError> {
        self.log_event_summary(event);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), FusionError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), FusionError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::{CameraStatus, CorrelationId, RadarDetection, TravelDirection, UNCLASSIFIED};

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        let event = ConsolidatedEvent {
            correlation_id: CorrelationId::new("c-1"),
            sequence: 0,
            radar: RadarDetection {
                speed: 25.5,
                magnitude: 90.0,
                direction: TravelDirection::Inbound,
                detected_at: Utc::now(),
            },
            camera: None,
            weather: None,
            vehicle_type: UNCLASSIFIED.to_string(),
            camera_status: CameraStatus::TimedOut,
            created_at: Utc::now(),
        };

        let result = sink.write(&event).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
