//! Inbound wire payloads for the radar and camera channels.
//!
//! These are the message contracts of the `radar-detections`,
//! `camera-requests` and `camera-responses` channels. The transport is
//! treated as at-least-once with possible duplication and reordering; the
//! correlation protocol makes that safe, not the transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CorrelationId;

/// A single radar trigger - one vehicle crossing the speed/magnitude
/// threshold.
///
/// Produced by the external radar collaborator. Carries no correlation id
/// on the wire; the Correlator mints one when the trigger is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarDetection {
    /// Measured speed (km/h)
    pub speed: f64,

    /// Doppler return magnitude (sensor units, signal strength proxy)
    pub magnitude: f64,

    /// Travel direction relative to the sensor
    pub direction: TravelDirection,

    /// Detection timestamp assigned by the radar collaborator
    pub detected_at: DateTime<Utc>,
}

/// Travel direction relative to the radar head.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelDirection {
    Inbound,
    Outbound,
    #[default]
    Unknown,
}

/// Request for the camera collaborator to capture and classify.
///
/// Created and owned by the Correlator; fire-and-forget, no acknowledgement
/// is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRequest {
    /// Join key shared with the eventual response
    pub correlation_id: CorrelationId,

    /// When the request was issued
    pub requested_at: DateTime<Utc>,

    /// Monitored zone identifier (which lane/approach to capture)
    pub zone: String,
}

/// Classification result from the camera collaborator.
///
/// At most one is expected per correlation id, but zero, one, or several
/// (duplicates, retries) must all be tolerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraResponse {
    /// Join key echoed from the camera request
    pub correlation_id: CorrelationId,

    /// Detected vehicle types, highest confidence first; may be empty when
    /// the sensor ran but found nothing
    pub vehicle_types: Vec<String>,

    /// Confidence of the top classification, in [0, 1]
    pub confidence: f64,

    /// Reference to the captured image in the camera's own store
    pub image_reference: Option<String>,

    /// When the camera produced the response
    pub responded_at: DateTime<Utc>,
}

impl CameraResponse {
    /// Top classification, if the sensor found anything.
    pub fn top_classification(&self) -> Option<&str> {
        self.vehicle_types.first().map(String::as_str)
    }
}
