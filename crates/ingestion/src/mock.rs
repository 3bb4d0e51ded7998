//! Mock transports
//!
//! For transport-free runs and tests: a radar source that emits synthetic
//! triggers, and a camera responder that echoes requests back as
//! classification results with configurable latency and fault injection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use contracts::{
    CameraRequest, CameraRequestPublisher, CameraResponse, Channel, FusionError, MessageCallback,
    MessageSource, RadarDetection, TravelDirection,
};
use rand::Rng;
use tracing::{debug, trace, warn};

/// Mock radar source configuration
#[derive(Debug, Clone)]
pub struct MockRadarConfig {
    /// Trigger rate (Hz)
    pub rate_hz: f64,

    /// Speed range (km/h)
    pub speed_range: (f64, f64),
}

impl Default for MockRadarConfig {
    fn default() -> Self {
        Self {
            rate_hz: 2.0,
            speed_range: (15.0, 120.0),
        }
    }
}

/// Mock radar source
///
/// Emits synthetic radar trigger payloads at a fixed rate on a dedicated
/// thread, the way a broker client would deliver from its own context.
pub struct MockRadarSource {
    config: MockRadarConfig,
    listening: Arc<AtomicBool>,
}

impl MockRadarSource {
    /// Create new mock radar source
    pub fn new(config: MockRadarConfig) -> Self {
        Self {
            config,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create with the given trigger rate
    pub fn with_rate(rate_hz: f64) -> Self {
        Self::new(MockRadarConfig {
            rate_hz,
            ..Default::default()
        })
    }
}

impl MessageSource for MockRadarSource {
    fn channel(&self) -> Channel {
        Channel::RadarDetections
    }

    fn listen(&self, callback: MessageCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let listening = self.listening.clone();

        debug!(rate_hz = config.rate_hz, "mock radar source started");

        std::thread::spawn(move || {
            let interval = Duration::from_secs_f64(1.0 / config.rate_hz);
            let mut rng = rand::rng();

            while listening.load(Ordering::Relaxed) {
                let (lo, hi) = config.speed_range;
                let detection = RadarDetection {
                    speed: rng.random_range(lo..hi),
                    magnitude: rng.random_range(80.0..200.0),
                    direction: if rng.random_bool(0.5) {
                        TravelDirection::Inbound
                    } else {
                        TravelDirection::Outbound
                    },
                    detected_at: Utc::now(),
                };

                match serde_json::to_vec(&detection) {
                    Ok(payload) => {
                        trace!(speed = detection.speed, "mock radar trigger");
                        callback(Bytes::from(payload));
                    }
                    Err(e) => warn!(error = %e, "mock radar encode failed"),
                }

                std::thread::sleep(interval);
            }

            debug!("mock radar source stopped");
        });
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

/// Mock camera responder configuration
#[derive(Debug, Clone)]
pub struct MockCameraConfig {
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,

    /// Probability a response is silently dropped
    pub drop_probability: f64,

    /// Probability a response is delivered twice
    pub duplicate_probability: f64,

    /// Probability a response carries no classifications
    pub empty_probability: f64,
}

impl Default for MockCameraConfig {
    fn default() -> Self {
        Self {
            latency_ms: 300,
            drop_probability: 0.0,
            duplicate_probability: 0.0,
            empty_probability: 0.0,
        }
    }
}

const VEHICLE_TYPES: [&str; 4] = ["car", "truck", "motorcycle", "bus"];

/// Mock camera responder
///
/// Plays both ends of the camera handshake: it accepts requests as a
/// `CameraRequestPublisher` and delivers the matching responses as a
/// `MessageSource` on the camera channel, after the configured latency.
/// Fault injection covers the dropped, duplicated and empty-classification
/// cases the correlation protocol must tolerate.
pub struct MockCameraResponder {
    config: MockCameraConfig,
    callback: Arc<Mutex<Option<MessageCallback>>>,
    listening: Arc<AtomicBool>,
    requests_seen: AtomicU64,
}

impl MockCameraResponder {
    /// Create new mock camera responder
    pub fn new(config: MockCameraConfig) -> Self {
        Self {
            config,
            callback: Arc::new(Mutex::new(None)),
            listening: Arc::new(AtomicBool::new(false)),
            requests_seen: AtomicU64::new(0),
        }
    }

    /// Create with the given latency and no fault injection
    pub fn with_latency(latency_ms: u64) -> Self {
        Self::new(MockCameraConfig {
            latency_ms,
            ..Default::default()
        })
    }

    /// Total requests accepted so far
    pub fn requests_seen(&self) -> u64 {
        self.requests_seen.load(Ordering::Relaxed)
    }

    fn build_response(&self, request: &CameraRequest) -> CameraResponse {
        let mut rng = rand::rng();
        let vehicle_types = if rng.random_bool(self.config.empty_probability) {
            Vec::new()
        } else {
            vec![VEHICLE_TYPES[rng.random_range(0..VEHICLE_TYPES.len())].to_string()]
        };

        CameraResponse {
            correlation_id: request.correlation_id.clone(),
            vehicle_types,
            confidence: rng.random_range(0.5..0.99),
            image_reference: Some(format!("img/{}.jpg", request.correlation_id)),
            responded_at: Utc::now(),
        }
    }
}

impl CameraRequestPublisher for MockCameraResponder {
    async fn publish(&self, request: &CameraRequest) -> Result<(), FusionError> {
        self.requests_seen.fetch_add(1, Ordering::Relaxed);

        let (dropped, duplicated) = {
            let mut rng = rand::rng();
            (
                rng.random_bool(self.config.drop_probability),
                rng.random_bool(self.config.duplicate_probability),
            )
        };

        if dropped {
            trace!(correlation_id = %request.correlation_id, "mock camera dropped response");
            return Ok(());
        }

        let response = self.build_response(request);
        let payload = serde_json::to_vec(&response)
            .map_err(|e| FusionError::publish_failure(request.correlation_id.as_str(), e.to_string()))?;
        let payload = Bytes::from(payload);

        let callback = self.callback.clone();
        let listening = self.listening.clone();
        let latency = Duration::from_millis(self.config.latency_ms);
        let correlation_id = request.correlation_id.clone();

        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            if !listening.load(Ordering::Relaxed) {
                return;
            }
            let cb = callback.lock().ok().and_then(|guard| guard.clone());
            if let Some(cb) = cb {
                trace!(correlation_id = %correlation_id, "mock camera response delivered");
                cb(payload.clone());
                if duplicated {
                    trace!(correlation_id = %correlation_id, "mock camera response duplicated");
                    cb(payload);
                }
            }
        });

        Ok(())
    }
}

impl MessageSource for MockCameraResponder {
    fn channel(&self) -> Channel {
        Channel::CameraResponses
    }

    fn listen(&self, callback: MessageCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut slot) = self.callback.lock() {
            *slot = Some(callback);
        }
        debug!(latency_ms = self.config.latency_ms, "mock camera responder started");
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.callback.lock() {
            *slot = None;
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

/// Publisher that discards every request.
///
/// Stands in for the camera collaborator being offline; every pending
/// correlation then resolves by deadline.
#[derive(Debug, Default)]
pub struct NullCameraPublisher;

impl CameraRequestPublisher for NullCameraPublisher {
    async fn publish(&self, _request: &CameraRequest) -> Result<(), FusionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::CorrelationId;
    use std::sync::atomic::AtomicUsize;

    fn request(id: &str) -> CameraRequest {
        CameraRequest {
            correlation_id: CorrelationId::new(id),
            requested_at: Utc::now(),
            zone: "nb-lane-1".into(),
        }
    }

    #[tokio::test]
    async fn test_responder_echoes_request() {
        let responder = MockCameraResponder::with_latency(10);
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        responder.listen(Arc::new(move |payload: Bytes| {
            sink.lock().unwrap().push(payload);
        }));

        responder.publish(&request("abc-123")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let payloads = received.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        let response: CameraResponse = serde_json::from_slice(&payloads[0]).unwrap();
        assert_eq!(response.correlation_id.as_str(), "abc-123");
        assert!(!response.vehicle_types.is_empty());
        assert!((0.0..=1.0).contains(&response.confidence));
    }

    #[tokio::test]
    async fn test_responder_drop_probability_one_never_responds() {
        let responder = MockCameraResponder::new(MockCameraConfig {
            latency_ms: 5,
            drop_probability: 1.0,
            ..Default::default()
        });
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        responder.listen(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        responder.publish(&request("dropped")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(count.load(Ordering::Relaxed), 0);
        assert_eq!(responder.requests_seen(), 1);
    }

    #[tokio::test]
    async fn test_responder_duplicate_probability_one_responds_twice() {
        let responder = MockCameraResponder::new(MockCameraConfig {
            latency_ms: 5,
            duplicate_probability: 1.0,
            ..Default::default()
        });
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        responder.listen(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

        responder.publish(&request("dup")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_responder_empty_probability_one_yields_no_types() {
        let responder = MockCameraResponder::new(MockCameraConfig {
            latency_ms: 5,
            empty_probability: 1.0,
            ..Default::default()
        });
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        responder.listen(Arc::new(move |payload: Bytes| {
            sink.lock().unwrap().push(payload);
        }));

        responder.publish(&request("empty")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let payloads = received.lock().unwrap();
        assert_eq!(payloads.len(), 1);
        let response: CameraResponse = serde_json::from_slice(&payloads[0]).unwrap();
        assert!(response.vehicle_types.is_empty());
    }

    #[test]
    fn test_mock_radar_emits_valid_payloads() {
        let source = MockRadarSource::with_rate(200.0);
        let received = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        source.listen(Arc::new(move |payload: Bytes| {
            sink.lock().unwrap().push(payload);
        }));
        assert!(source.is_listening());

        std::thread::sleep(Duration::from_millis(100));
        source.stop();

        let payloads = received.lock().unwrap();
        assert!(!payloads.is_empty());
        let detection: RadarDetection = serde_json::from_slice(&payloads[0]).unwrap();
        assert!(detection.speed >= 15.0 && detection.speed < 120.0);
        assert!(detection.magnitude >= 80.0);
    }
}
