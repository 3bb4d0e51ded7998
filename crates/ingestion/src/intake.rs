//! Message intake - transport callbacks to bounded channels.
//!
//! One `MessageIntake` owns both inbound channels. Transport callbacks run
//! on transport threads and must never block, so payloads are decoded and
//! pushed with `try_send`; the configured drop policy decides what gives
//! way when a channel is full.

use std::collections::HashMap;
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use bytes::Bytes;
use contracts::{CameraResponse, Channel, MessageCallback, MessageSource, RadarDetection};
use metrics::counter;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::{BackpressureConfig, DropPolicy, IntakeMetrics};
use crate::decode;

/// Message intake
///
/// Bridges registered `MessageSource`s onto two typed bounded channels,
/// one per inbound channel. Mock and live transports register the same way.
pub struct MessageIntake {
    /// Registered sources, at most one per channel
    sources: HashMap<Channel, Box<dyn MessageSource>>,

    /// Shared metrics
    metrics: Arc<IntakeMetrics>,

    radar_tx: Sender<RadarDetection>,
    radar_rx: Option<Receiver<RadarDetection>>,
    // Receiver clone held for drop-oldest eviction (async-channel is MPMC)
    radar_evict_rx: Receiver<RadarDetection>,

    camera_tx: Sender<CameraResponse>,
    camera_rx: Option<Receiver<CameraResponse>>,
    camera_evict_rx: Receiver<CameraResponse>,

    config: BackpressureConfig,
}

impl MessageIntake {
    /// Create new intake with the given backpressure configuration
    pub fn new(config: BackpressureConfig) -> Self {
        let (radar_tx, radar_rx) = bounded(config.channel_capacity);
        let (camera_tx, camera_rx) = bounded(config.channel_capacity);

        Self {
            sources: HashMap::new(),
            metrics: Arc::new(IntakeMetrics::new()),
            radar_evict_rx: radar_rx.clone(),
            radar_tx,
            radar_rx: Some(radar_rx),
            camera_evict_rx: camera_rx.clone(),
            camera_tx,
            camera_rx: Some(camera_rx),
            config,
        }
    }

    /// Register a message source for its channel.
    ///
    /// A later registration for the same channel replaces the earlier one.
    #[instrument(name = "intake_register_source", skip(self, source), fields(channel = %source.channel().name()))]
    pub fn register_source(&mut self, source: Box<dyn MessageSource>) {
        debug!(channel = %source.channel().name(), "registered message source");
        self.sources.insert(source.channel(), source);
    }

    /// Start all registered sources
    #[instrument(name = "intake_start_all", skip(self))]
    pub fn start_all(&self) {
        info!(count = self.sources.len(), "starting all message sources");
        for (channel, source) in &self.sources {
            if !source.is_listening() {
                source.listen(self.make_callback(*channel));
            }
        }
    }

    /// Stop all sources
    #[instrument(name = "intake_stop_all", skip(self))]
    pub fn stop_all(&self) {
        info!(count = self.sources.len(), "stopping all message sources");
        for source in self.sources.values() {
            if source.is_listening() {
                source.stop();
            }
        }
    }

    /// Decoded radar detection stream.
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_radar_receiver(&mut self) -> Option<Receiver<RadarDetection>> {
        self.radar_rx.take()
    }

    /// Decoded camera response stream.
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_camera_receiver(&mut self) -> Option<Receiver<CameraResponse>> {
        self.camera_rx.take()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IntakeMetrics> {
        self.metrics.clone()
    }

    /// Check if the source for a channel is listening
    pub fn is_listening(&self, channel: Channel) -> bool {
        self.sources
            .get(&channel)
            .map(|s| s.is_listening())
            .unwrap_or(false)
    }

    fn make_callback(&self, channel: Channel) -> MessageCallback {
        match channel {
            Channel::RadarDetections => {
                let tx = self.radar_tx.clone();
                let rx = self.radar_evict_rx.clone();
                let metrics = self.metrics.clone();
                let policy = self.config.drop_policy;
                Arc::new(move |payload: Bytes| {
                    metrics.record_received();
                    counter!("intake_messages_received_total", "channel" => channel.name())
                        .increment(1);
                    match decode::decode_radar_detection(&payload) {
                        Ok(detection) => {
                            forward(channel, &tx, &rx, detection, &metrics, policy);
                        }
                        Err(e) => {
                            metrics.record_malformed();
                            counter!("intake_malformed_total", "channel" => channel.name())
                                .increment(1);
                            warn!(channel = %channel.name(), error = %e, "malformed payload dropped");
                        }
                    }
                })
            }
            Channel::CameraResponses => {
                let tx = self.camera_tx.clone();
                let rx = self.camera_evict_rx.clone();
                let metrics = self.metrics.clone();
                let policy = self.config.drop_policy;
                Arc::new(move |payload: Bytes| {
                    metrics.record_received();
                    counter!("intake_messages_received_total", "channel" => channel.name())
                        .increment(1);
                    match decode::decode_camera_response(&payload) {
                        Ok(response) => {
                            forward(channel, &tx, &rx, response, &metrics, policy);
                        }
                        Err(e) => {
                            metrics.record_malformed();
                            counter!("intake_malformed_total", "channel" => channel.name())
                                .increment(1);
                            warn!(channel = %channel.name(), error = %e, "malformed payload dropped");
                        }
                    }
                })
            }
        }
    }
}

impl Drop for MessageIntake {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Forward a decoded message, honoring the drop policy when full.
#[inline]
fn forward<T>(
    channel: Channel,
    tx: &Sender<T>,
    rx: &Receiver<T>,
    message: T,
    metrics: &Arc<IntakeMetrics>,
    policy: DropPolicy,
) {
    metrics.update_queue_len(tx.len());
    match tx.try_send(message) {
        Ok(()) => {
            trace!(channel = %channel.name(), "message forwarded");
        }
        Err(TrySendError::Full(message)) => {
            metrics.record_dropped();
            counter!("intake_messages_dropped_total", "channel" => channel.name()).increment(1);
            match policy {
                DropPolicy::DropNewest => {
                    trace!(channel = %channel.name(), "message dropped (newest)");
                }
                DropPolicy::DropOldest => {
                    // Evict the head and retry once. If a consumer raced us
                    // and emptied a slot, the retry lands either way.
                    let _ = rx.try_recv();
                    if tx.try_send(message).is_err() {
                        trace!(channel = %channel.name(), "message dropped (oldest eviction raced)");
                    } else {
                        trace!(channel = %channel.name(), "oldest message evicted");
                    }
                }
            }
        }
        Err(TrySendError::Closed(_)) => {
            warn!(channel = %channel.name(), "channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Test source that delivers pre-seeded payloads synchronously on listen.
    struct SeededSource {
        channel: Channel,
        payloads: Mutex<Vec<Bytes>>,
        listening: Arc<AtomicBool>,
    }

    impl SeededSource {
        fn new(channel: Channel, payloads: Vec<Bytes>) -> Self {
            Self {
                channel,
                payloads: Mutex::new(payloads),
                listening: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl MessageSource for SeededSource {
        fn channel(&self) -> Channel {
            self.channel
        }

        fn listen(&self, callback: MessageCallback) {
            if self.listening.swap(true, Ordering::SeqCst) {
                return;
            }
            for payload in self.payloads.lock().unwrap().drain(..) {
                callback(payload);
            }
        }

        fn stop(&self) {
            self.listening.store(false, Ordering::SeqCst);
        }

        fn is_listening(&self) -> bool {
            self.listening.load(Ordering::Relaxed)
        }
    }

    fn radar_payload(speed: f64) -> Bytes {
        Bytes::from(format!(
            r#"{{"speed":{speed},"magnitude":120.0,"direction":"inbound","detected_at":"2026-08-29T12:00:00Z"}}"#
        ))
    }

    #[test]
    fn test_decoded_detections_reach_channel() {
        let mut intake = MessageIntake::new(BackpressureConfig::default());
        intake.register_source(Box::new(SeededSource::new(
            Channel::RadarDetections,
            vec![radar_payload(10.0), radar_payload(20.0)],
        )));

        intake.start_all();

        let rx = intake.take_radar_receiver().unwrap();
        assert_eq!(rx.try_recv().unwrap().speed, 10.0);
        assert_eq!(rx.try_recv().unwrap().speed, 20.0);
        assert!(rx.try_recv().is_err());
        assert_eq!(intake.metrics().snapshot().messages_received, 2);
    }

    #[test]
    fn test_malformed_payload_counted_not_forwarded() {
        let mut intake = MessageIntake::new(BackpressureConfig::default());
        intake.register_source(Box::new(SeededSource::new(
            Channel::RadarDetections,
            vec![Bytes::from_static(b"{broken"), radar_payload(30.0)],
        )));

        intake.start_all();

        let rx = intake.take_radar_receiver().unwrap();
        assert_eq!(rx.try_recv().unwrap().speed, 30.0);
        assert!(rx.try_recv().is_err());
        let snapshot = intake.metrics().snapshot();
        assert_eq!(snapshot.malformed, 1);
        assert_eq!(snapshot.messages_received, 2);
    }

    #[test]
    fn test_drop_oldest_evicts_head() {
        let mut intake = MessageIntake::new(BackpressureConfig::new(2, DropPolicy::DropOldest));
        intake.register_source(Box::new(SeededSource::new(
            Channel::RadarDetections,
            vec![radar_payload(1.0), radar_payload(2.0), radar_payload(3.0)],
        )));

        intake.start_all();

        let rx = intake.take_radar_receiver().unwrap();
        // Oldest (1.0) was evicted to admit 3.0.
        assert_eq!(rx.try_recv().unwrap().speed, 2.0);
        assert_eq!(rx.try_recv().unwrap().speed, 3.0);
        assert!(rx.try_recv().is_err());
        assert_eq!(intake.metrics().snapshot().messages_dropped, 1);
    }

    #[test]
    fn test_drop_newest_keeps_head() {
        let mut intake = MessageIntake::new(BackpressureConfig::new(2, DropPolicy::DropNewest));
        intake.register_source(Box::new(SeededSource::new(
            Channel::RadarDetections,
            vec![radar_payload(1.0), radar_payload(2.0), radar_payload(3.0)],
        )));

        intake.start_all();

        let rx = intake.take_radar_receiver().unwrap();
        assert_eq!(rx.try_recv().unwrap().speed, 1.0);
        assert_eq!(rx.try_recv().unwrap().speed, 2.0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_listen_idempotent() {
        let mut intake = MessageIntake::new(BackpressureConfig::default());
        intake.register_source(Box::new(SeededSource::new(
            Channel::RadarDetections,
            vec![radar_payload(5.0)],
        )));

        intake.start_all();
        intake.start_all();

        assert!(intake.is_listening(Channel::RadarDetections));
        let rx = intake.take_radar_receiver().unwrap();
        assert_eq!(rx.try_recv().unwrap().speed, 5.0);
        assert!(rx.try_recv().is_err());
    }
}
