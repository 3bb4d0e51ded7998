//! SinkHandle - manages a sink with isolated queue and worker task

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{ConsolidatedEvent, EventSink, RetryConfig};

use crate::metrics::SinkMetrics;
use crate::queue::{DeliveryQueue, PushOutcome};

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Per-sink delivery queue (drop-oldest on overflow)
    queue: Arc<DeliveryQueue<ConsolidatedEvent>>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: EventSink + Send + 'static>(
        sink: S,
        queue_capacity: usize,
        retry: RetryConfig,
    ) -> Self {
        let name = sink.name().to_string();
        let queue = Arc::new(DeliveryQueue::new(queue_capacity));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_queue = Arc::clone(&queue);
        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, worker_queue, retry, worker_metrics, worker_name).await;
        });

        Self {
            name,
            queue,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Enqueue an event for delivery (non-blocking).
    ///
    /// Returns true if enqueued without loss; false if the oldest queued
    /// event had to be evicted for this sink only.
    pub fn enqueue(&self, event: ConsolidatedEvent) -> bool {
        match self.queue.push(event) {
            PushOutcome::Enqueued => {
                self.metrics.set_queue_len(self.queue.len());
                true
            }
            PushOutcome::DroppedOldest => {
                self.metrics.inc_dropped_count();
                warn!(sink = %self.name, "queue full, dropped oldest queued event");
                false
            }
            PushOutcome::Closed => {
                error!(sink = %self.name, "sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Shutdown the sink worker gracefully, draining the queue first
    #[instrument(name = "sink_handle_shutdown", skip(self))]
    pub async fn shutdown(self) {
        self.queue.close();
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that consumes events and writes to sink with retry
#[instrument(
    name = "sink_worker_loop",
    skip(sink, queue, retry, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: EventSink>(
    mut sink: S,
    queue: Arc<DeliveryQueue<ConsolidatedEvent>>,
    retry: RetryConfig,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(event) = queue.pop().await {
        metrics.set_queue_len(queue.len());
        deliver_with_retry(&mut sink, &event, &retry, &metrics, &name).await;
    }

    // Cleanup
    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}

/// At-least-once delivery of one event: exponential backoff, bounded
/// attempts, then abandon and move on. A single bad event never wedges
/// the queue.
async fn deliver_with_retry<S: EventSink>(
    sink: &mut S,
    event: &ConsolidatedEvent,
    retry: &RetryConfig,
    metrics: &SinkMetrics,
    name: &str,
) {
    for attempt in 0..retry.max_attempts {
        match sink.write(event).await {
            Ok(()) => {
                metrics.inc_delivered_count();
                return;
            }
            Err(e) if attempt + 1 < retry.max_attempts => {
                metrics.inc_retry_count();
                let backoff = retry.backoff_ms(attempt);
                warn!(
                    sink = %name,
                    correlation_id = %event.correlation_id,
                    attempt = attempt + 1,
                    backoff_ms = backoff,
                    error = %e,
                    "Write failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                metrics.inc_abandoned_count();
                error!(
                    sink = %name,
                    correlation_id = %event.correlation_id,
                    attempts = retry.max_attempts,
                    error = %e,
                    "Delivery abandoned after final attempt"
                );
            }
        }
    }
}
