//! Consolidator - one immutable ConsolidatedEvent per correlation outcome.
//!
//! Construction is pure and infallible; malformed field values are already
//! rejected at the ingestion boundary. Weather enrichment is a synchronous
//! cache lookup, never a remote call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use chrono::Utc;
use contracts::{
    CameraData, CameraStatus, ConsolidatedEvent, WeatherConfig, WeatherProvider, UNCLASSIFIED,
};
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::correlator::CorrelationOutcome;

/// Turns correlation outcomes into consolidated events, exactly one each.
pub struct Consolidator<W> {
    weather: Arc<W>,
    staleness: Duration,
    sequence: AtomicU64,
}

impl<W> Consolidator<W>
where
    W: WeatherProvider,
{
    pub fn new(weather: Arc<W>, config: &WeatherConfig) -> Self {
        Self {
            weather,
            staleness: Duration::milliseconds(config.staleness_ms as i64),
            sequence: AtomicU64::new(0),
        }
    }

    /// Events built so far
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Build the event for one outcome.
    pub fn build(&self, outcome: CorrelationOutcome) -> ConsolidatedEvent {
        let CorrelationOutcome {
            correlation_id,
            radar,
            camera,
            resolution,
        } = outcome;

        // matched / not_available need a response; every camera-less
        // resolution (deadline or eviction) reports timed_out.
        let camera_status = match &camera {
            Some(response) if response.vehicle_types.is_empty() => CameraStatus::NotAvailable,
            Some(_) => CameraStatus::Matched,
            None => CameraStatus::TimedOut,
        };

        let vehicle_type = camera
            .as_ref()
            .and_then(|response| response.top_classification())
            .unwrap_or(UNCLASSIFIED)
            .to_string();

        let weather = self.weather.nearest(radar.detected_at, self.staleness);
        if weather.is_none() {
            debug!(correlation_id = %correlation_id, "no fresh weather snapshot, emitting without");
        }

        let camera = camera.map(|response| CameraData {
            vehicle_types: response.vehicle_types,
            confidence: response.confidence,
            image_reference: response.image_reference,
            responded_at: response.responded_at,
        });

        counter!("consolidator_events_total", "camera_status" => camera_status.as_str())
            .increment(1);
        debug!(
            correlation_id = %correlation_id,
            ?camera_status,
            ?resolution,
            vehicle_type = %vehicle_type,
            "consolidated event built"
        );

        ConsolidatedEvent {
            correlation_id,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            radar,
            camera,
            weather,
            vehicle_type,
            camera_status,
            created_at: Utc::now(),
        }
    }

    /// Consume outcomes until the correlator side closes.
    pub async fn run(
        &self,
        mut outcome_rx: mpsc::Receiver<CorrelationOutcome>,
        event_tx: mpsc::Sender<ConsolidatedEvent>,
    ) {
        info!(staleness_ms = self.staleness.num_milliseconds(), "consolidator started");

        while let Some(outcome) = outcome_rx.recv().await {
            let event = self.build(outcome);
            if event_tx.send(event).await.is_err() {
                warn!("event channel closed, consolidator stopping");
                break;
            }
        }

        info!(events = self.sequence(), "consolidator stopped");
    }
}
