//! Correlator - mints identities, tracks open correlations, resolves each
//! exactly once.
//!
//! Three producers race on the pending table: the radar intake, the camera
//! intake and the deadline timers. `PendingTable::take` is the single
//! atomic transition; whichever path takes the entry owns the handoff to
//! the consolidator, the loser is a guaranteed no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use chrono::Utc;
use contracts::{
    CameraRequest, CameraRequestPublisher, CameraResponse, CorrelationId, CorrelatorConfig,
    RadarDetection,
};
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::pending::{PendingCorrelation, PendingTable};

/// How a correlation reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Camera response arrived before the deadline
    Matched,
    /// Deadline fired with no camera response
    DeadlineExpired,
    /// Force-expired to bound the pending table under overload
    Evicted,
}

/// Terminal correlation handed to the consolidator, at most once per id.
#[derive(Debug, Clone)]
pub struct CorrelationOutcome {
    pub correlation_id: CorrelationId,
    pub radar: RadarDetection,
    /// Present only when `resolution` is `Matched`
    pub camera: Option<CameraResponse>,
    pub resolution: Resolution,
}

/// Correlator metrics
#[derive(Debug, Default)]
pub struct CorrelatorMetrics {
    /// Radar triggers processed
    pub detections: AtomicU64,
    /// Correlations resolved by a camera response
    pub matched: AtomicU64,
    /// Correlations resolved by deadline expiry
    pub timed_out: AtomicU64,
    /// Correlations force-expired by the pending bound
    pub evicted: AtomicU64,
    /// Camera responses with no live correlation (late, duplicate, unknown)
    pub orphan_responses: AtomicU64,
    /// Repeat correlation ids rejected at insert
    pub duplicate_ids: AtomicU64,
    /// Camera request publish failures
    pub publish_failures: AtomicU64,
}

impl CorrelatorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get snapshot
    pub fn snapshot(&self) -> CorrelatorSnapshot {
        CorrelatorSnapshot {
            detections: self.detections.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            orphan_responses: self.orphan_responses.load(Ordering::Relaxed),
            duplicate_ids: self.duplicate_ids.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct CorrelatorSnapshot {
    pub detections: u64,
    pub matched: u64,
    pub timed_out: u64,
    pub evicted: u64,
    pub orphan_responses: u64,
    pub duplicate_ids: u64,
    pub publish_failures: u64,
}

/// The correlation core.
///
/// Generic over the outbound camera-request publisher so mock and live
/// transports wire in the same way.
pub struct Correlator<P> {
    pending: Arc<PendingTable>,
    publisher: Arc<P>,
    outcome_tx: mpsc::Sender<CorrelationOutcome>,
    camera_timeout: Duration,
    max_pending: usize,
    zone: String,
    metrics: Arc<CorrelatorMetrics>,
}

impl<P> Correlator<P>
where
    P: CameraRequestPublisher + Send + Sync + 'static,
{
    /// Create a new correlator.
    ///
    /// `outcome_tx` is the single handoff to the consolidator; `zone` is
    /// carried verbatim on every camera request.
    pub fn new(
        config: &CorrelatorConfig,
        zone: impl Into<String>,
        publisher: Arc<P>,
        outcome_tx: mpsc::Sender<CorrelationOutcome>,
    ) -> Self {
        Self {
            pending: Arc::new(PendingTable::new()),
            publisher,
            outcome_tx,
            camera_timeout: Duration::from_millis(config.camera_timeout_ms),
            max_pending: config.max_pending,
            zone: zone.into(),
            metrics: Arc::new(CorrelatorMetrics::new()),
        }
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<CorrelatorMetrics> {
        self.metrics.clone()
    }

    /// Number of open correlations
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Consume both intake streams until they close.
    ///
    /// One worker task per stream: the two streams have no mutual
    /// ordering, and a slow camera-request publish on the radar side must
    /// never delay response handling. Both workers share the sharded
    /// pending table, so neither blocks the other on unrelated ids.
    pub async fn run(
        self: Arc<Self>,
        radar_rx: Receiver<RadarDetection>,
        camera_rx: Receiver<CameraResponse>,
    ) {
        info!(
            camera_timeout_ms = self.camera_timeout.as_millis() as u64,
            max_pending = self.max_pending,
            "correlator started"
        );

        let radar_worker = {
            let correlator = Arc::clone(&self);
            tokio::spawn(async move {
                while let Ok(detection) = radar_rx.recv().await {
                    correlator.handle_detection(detection).await;
                }
            })
        };
        let camera_worker = {
            let correlator = Arc::clone(&self);
            tokio::spawn(async move {
                while let Ok(response) = camera_rx.recv().await {
                    correlator.handle_response(response).await;
                }
            })
        };

        let _ = radar_worker.await;
        let _ = camera_worker.await;
        info!("correlator intake streams closed");
    }

    /// One radar trigger: open a correlation, arm its deadline, request the
    /// camera.
    #[instrument(name = "correlator_on_detection", skip(self, detection), fields(speed = detection.speed))]
    pub async fn handle_detection(&self, detection: RadarDetection) {
        self.metrics.detections.fetch_add(1, Ordering::Relaxed);
        counter!("correlator_detections_total").increment(1);

        // Bound the table before admitting the new entry.
        while self.pending.len() >= self.max_pending {
            self.evict_one().await;
        }

        let id = CorrelationId::generate();
        let deadline = Instant::now() + self.camera_timeout;
        let entry = PendingCorrelation {
            radar: detection,
            created_at: Utc::now(),
            deadline,
            timer: None,
        };

        if let Err(e) = self.pending.insert(id.clone(), entry) {
            // Id-generation fault; keep the first registration.
            self.metrics.duplicate_ids.fetch_add(1, Ordering::Relaxed);
            warn!(correlation_id = %id, error = %e, "rejected repeat correlation id");
            return;
        }
        gauge!("correlator_pending").set(self.pending.len() as f64);

        self.arm_deadline(id.clone(), deadline);

        let request = CameraRequest {
            correlation_id: id.clone(),
            requested_at: Utc::now(),
            zone: self.zone.clone(),
        };
        if let Err(e) = self.publisher.publish(&request).await {
            // Never fatal: the entry stays and expires into a radar-only
            // event via its deadline.
            self.metrics.publish_failures.fetch_add(1, Ordering::Relaxed);
            counter!("correlator_publish_failures_total").increment(1);
            warn!(correlation_id = %id, error = %e, "camera request publish failed");
        }
    }

    /// One camera response: resolve its correlation, or drop it silently.
    #[instrument(name = "correlator_on_response", skip(self, response), fields(correlation_id = %response.correlation_id))]
    pub async fn handle_response(&self, response: CameraResponse) {
        match self.pending.take(&response.correlation_id) {
            Some(mut entry) => {
                entry.cancel_timer();
                self.metrics.matched.fetch_add(1, Ordering::Relaxed);
                counter!("correlator_matched_total").increment(1);
                gauge!("correlator_pending").set(self.pending.len() as f64);

                let outcome = CorrelationOutcome {
                    correlation_id: response.correlation_id.clone(),
                    radar: entry.radar.clone(),
                    camera: Some(response),
                    resolution: Resolution::Matched,
                };
                self.hand_off(outcome).await;
            }
            None => {
                // Late, duplicate or unknown id. Silent to callers.
                self.metrics.orphan_responses.fetch_add(1, Ordering::Relaxed);
                counter!("correlator_orphan_responses_total").increment(1);
                debug!(correlation_id = %response.correlation_id, "dropped response with no live correlation");
            }
        }
    }

    /// Arm the deadline timer for an open correlation.
    fn arm_deadline(&self, id: CorrelationId, deadline: Instant) {
        let pending = self.pending.clone();
        let outcome_tx = self.outcome_tx.clone();
        let metrics = self.metrics.clone();
        let task_id = id.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(mut entry) = pending.take(&task_id) {
                // Clear without aborting: this IS the timer task.
                entry.timer.take();
                metrics.timed_out.fetch_add(1, Ordering::Relaxed);
                counter!("correlator_timed_out_total").increment(1);
                gauge!("correlator_pending").set(pending.len() as f64);
                debug!(correlation_id = %task_id, "correlation deadline expired");

                let outcome = CorrelationOutcome {
                    correlation_id: task_id,
                    radar: entry.radar.clone(),
                    camera: None,
                    resolution: Resolution::DeadlineExpired,
                };
                if outcome_tx.send(outcome).await.is_err() {
                    warn!("consolidator handoff closed, expired correlation lost");
                }
            }
            // Entry already taken: the response won the race, no-op.
        });

        if !self.pending.arm_timer(&id, task.abort_handle()) {
            // Resolved before the timer was installed; the task will fire
            // and no-op, aborting it just saves the wakeup.
            task.abort();
        }
    }

    /// Force-expire the oldest open correlation.
    async fn evict_one(&self) {
        if let Some((id, mut entry)) = self.pending.evict_oldest() {
            entry.cancel_timer();
            self.metrics.evicted.fetch_add(1, Ordering::Relaxed);
            counter!("correlator_evicted_total").increment(1);
            warn!(correlation_id = %id, "pending table full, force-expiring oldest correlation");

            let outcome = CorrelationOutcome {
                correlation_id: id,
                radar: entry.radar.clone(),
                camera: None,
                resolution: Resolution::Evicted,
            };
            self.hand_off(outcome).await;
        }
    }

    async fn hand_off(&self, outcome: CorrelationOutcome) {
        if self.outcome_tx.send(outcome).await.is_err() {
            warn!("consolidator handoff closed, outcome lost");
        }
    }
}
