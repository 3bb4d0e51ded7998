//! Dispatcher - fans consolidated events out to all configured sinks
//!
//! One slow or failing sink never delays the others: every sink owns an
//! isolated queue and worker, and dispatch is a non-blocking enqueue.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use contracts::{ConsolidatedEvent, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::SinkMetrics;
use crate::sinks::{FileSink, LogSink, UdpSink};

/// Dispatcher configuration
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Sinks to fan out to
    pub sinks: Vec<SinkConfig>,
}

/// Builder for the dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<ConsolidatedEvent>,
}

impl DispatcherBuilder {
    /// Create a new builder
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<ConsolidatedEvent>) -> Self {
        Self { config, input_rx }
    }

    /// Build the dispatcher, creating all configured sinks
    #[instrument(name = "dispatcher_build", skip(self))]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut handles = Vec::with_capacity(self.config.sinks.len());

        for sink_config in &self.config.sinks {
            let handle = create_sink_handle(sink_config).await?;
            info!(sink = %handle.name(), "Sink registered");
            handles.push(handle);
        }

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }
}

/// Create a SinkHandle for one sink config entry
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let handle = match config.sink_type {
        SinkType::Log => SinkHandle::spawn(
            LogSink::new(&config.name),
            config.queue_capacity,
            config.retry.clone(),
        ),
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            SinkHandle::spawn(sink, config.queue_capacity, config.retry.clone())
        }
        SinkType::Udp => {
            let sink = UdpSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            SinkHandle::spawn(sink, config.queue_capacity, config.retry.clone())
        }
    };

    Ok(handle)
}

/// Fans consolidated events out to every registered sink
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<ConsolidatedEvent>,
}

impl Dispatcher {
    /// Create a dispatcher from pre-built handles (for tests and custom sinks)
    pub fn with_handles(
        handles: Vec<SinkHandle>,
        input_rx: mpsc::Receiver<ConsolidatedEvent>,
    ) -> Self {
        Self { handles, input_rx }
    }

    /// Per-sink metrics, keyed by sink name
    pub fn metrics(&self) -> Vec<(String, Arc<SinkMetrics>)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect()
    }

    /// Run the dispatch loop until the input channel closes, then shut
    /// every sink down gracefully.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut dispatched: u64 = 0;

        while let Some(event) = self.input_rx.recv().await {
            self.dispatch_event(event);
            dispatched += 1;

            if dispatched % 100 == 0 {
                debug!(dispatched, "Dispatch progress");
            }
        }

        info!(dispatched, "Input channel closed, shutting down sinks");
        self.shutdown_handles().await;
    }

    /// Spawn the dispatch loop as a task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    fn dispatch_event(&self, event: ConsolidatedEvent) {
        counter!("dispatcher_events_total").increment(1);

        for handle in &self.handles {
            if !handle.enqueue(event.clone()) {
                counter!("dispatcher_enqueue_losses_total", "sink" => handle.name().to_string())
                    .increment(1);
                warn!(
                    sink = %handle.name(),
                    correlation_id = %event.correlation_id,
                    "Enqueue caused loss at this sink"
                );
            }
        }
    }

    async fn shutdown_handles(self) {
        for handle in self.handles {
            let name = handle.name().to_string();
            handle.shutdown().await;
            debug!(sink = %name, "Sink shut down");
        }
    }
}

/// Convenience: build and spawn a dispatcher in one call
pub async fn create_dispatcher(
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<ConsolidatedEvent>,
) -> Result<(JoinHandle<()>, Vec<(String, Arc<SinkMetrics>)>), DispatcherError> {
    let dispatcher = DispatcherBuilder::new(config, input_rx).build().await?;

    if dispatcher.handles.is_empty() {
        error!("No sinks configured, events will be discarded");
    }

    let metrics = dispatcher.metrics();
    Ok((dispatcher.spawn(), metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::{
        CameraStatus, CorrelationId, RadarDetection, RetryConfig, TravelDirection, UNCLASSIFIED,
    };

    fn event(sequence: u64) -> ConsolidatedEvent {
        ConsolidatedEvent {
            correlation_id: CorrelationId::generate(),
            sequence,
            radar: RadarDetection {
                speed: 28.0,
                magnitude: 95.0,
                direction: TravelDirection::Inbound,
                detected_at: Utc::now(),
            },
            camera: None,
            weather: None,
            vehicle_type: UNCLASSIFIED.to_string(),
            camera_status: CameraStatus::TimedOut,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fanout_delivers_to_every_sink() {
        let retry = RetryConfig::default();
        let a = SinkHandle::spawn(LogSink::new("sink_a"), 10, retry.clone());
        let b = SinkHandle::spawn(LogSink::new("sink_b"), 10, retry);

        let (tx, rx) = mpsc::channel(16);
        let dispatcher = Dispatcher::with_handles(vec![a, b], rx);
        let metrics = dispatcher.metrics();
        let task = dispatcher.spawn();

        for i in 0..4 {
            tx.send(event(i)).await.unwrap();
        }
        drop(tx);
        task.await.unwrap();

        for (name, m) in metrics {
            assert_eq!(m.delivered_count(), 4, "sink {name} missed events");
        }
    }

    #[tokio::test]
    async fn test_build_from_config() {
        let config = DispatcherConfig {
            sinks: vec![SinkConfig {
                name: "console".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 8,
                retry: RetryConfig::default(),
                params: Default::default(),
            }],
        };

        let (tx, rx) = mpsc::channel(4);
        let (task, metrics) = create_dispatcher(config, rx).await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].0, "console");

        tx.send(event(0)).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(metrics[0].1.delivered_count(), 1);
    }
}
