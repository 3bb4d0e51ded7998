//! ConsolidatedEvent - the Consolidator's output.
//!
//! Exactly one is produced per correlation id, regardless of how many
//! camera responses arrive or how timers race.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CorrelationId, RadarDetection, WeatherSnapshot};

/// Sentinel vehicle type used when no camera classification is available.
pub const UNCLASSIFIED: &str = "unclassified";

/// Outcome of the camera handshake for a consolidated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    /// A camera response arrived before the deadline and carried at least
    /// one classification
    Matched,
    /// The deadline fired first (or the entry was force-expired under
    /// capacity pressure)
    TimedOut,
    /// A camera response arrived but its classification list was empty
    NotAvailable,
}

impl CameraStatus {
    /// Status name as used in logs and metric labels (matches the wire tag).
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraStatus::Matched => "matched",
            CameraStatus::TimedOut => "timed_out",
            CameraStatus::NotAvailable => "not_available",
        }
    }
}

/// Camera half of a consolidated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraData {
    /// Detected vehicle types, highest confidence first
    pub vehicle_types: Vec<String>,

    /// Confidence of the top classification
    pub confidence: f64,

    /// Reference to the captured image
    pub image_reference: Option<String>,

    /// When the camera produced the response
    pub responded_at: DateTime<Utc>,
}

/// One consolidated detection event per physical vehicle pass.
///
/// Immutable once built; ownership passes to the persistence and broadcast
/// collaborators through the Dispatch Sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedEvent {
    /// Join key of the underlying correlation
    pub correlation_id: CorrelationId,

    /// Monotonic per-process sequence number (broadcast consumers may use
    /// it for dedup alongside the correlation id)
    pub sequence: u64,

    /// The radar trigger that opened the correlation
    pub radar: RadarDetection,

    /// Camera data, absent on the timeout path
    pub camera: Option<CameraData>,

    /// Nearest weather snapshot within the staleness bound, else absent
    pub weather: Option<WeatherSnapshot>,

    /// Resolved vehicle type (`"unclassified"` without camera data)
    pub vehicle_type: String,

    /// How the camera handshake resolved
    pub camera_status: CameraStatus,

    /// When the Consolidator built this event
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TravelDirection;

    #[test]
    fn test_camera_status_serde_tags() {
        assert_eq!(
            serde_json::to_string(&CameraStatus::TimedOut).unwrap(),
            "\"timed_out\""
        );
        assert_eq!(
            serde_json::to_string(&CameraStatus::NotAvailable).unwrap(),
            "\"not_available\""
        );
    }

    #[test]
    fn test_event_roundtrip() {
        let event = ConsolidatedEvent {
            correlation_id: CorrelationId::new("c1"),
            sequence: 7,
            radar: RadarDetection {
                speed: 25.5,
                magnitude: 80.0,
                direction: TravelDirection::Outbound,
                detected_at: Utc::now(),
            },
            camera: None,
            weather: None,
            vehicle_type: UNCLASSIFIED.to_string(),
            camera_status: CameraStatus::TimedOut,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: ConsolidatedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
