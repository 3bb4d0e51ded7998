//! Payload decoding and field validation.
//!
//! Raw transport bytes become typed messages here, or get rejected. A
//! malformed payload is counted and logged by the caller and never reaches
//! the correlation core.

use bytes::Bytes;
use contracts::{CameraResponse, Channel, FusionError, RadarDetection};

/// Decode and validate a radar detection payload.
///
/// # Errors
/// Returns `FusionError::MalformedMessage` on JSON errors or invalid fields
/// (non-finite or negative speed/magnitude).
pub fn decode_radar_detection(payload: &Bytes) -> Result<RadarDetection, FusionError> {
    let detection: RadarDetection = serde_json::from_slice(payload)
        .map_err(|e| FusionError::malformed(Channel::RadarDetections.name(), e.to_string()))?;

    if !detection.speed.is_finite() || detection.speed < 0.0 {
        return Err(FusionError::malformed(
            Channel::RadarDetections.name(),
            format!("invalid speed: {}", detection.speed),
        ));
    }
    if !detection.magnitude.is_finite() || detection.magnitude < 0.0 {
        return Err(FusionError::malformed(
            Channel::RadarDetections.name(),
            format!("invalid magnitude: {}", detection.magnitude),
        ));
    }

    Ok(detection)
}

/// Decode and validate a camera response payload.
///
/// # Errors
/// Returns `FusionError::MalformedMessage` on JSON errors, an empty
/// correlation id, or a confidence outside [0, 1].
pub fn decode_camera_response(payload: &Bytes) -> Result<CameraResponse, FusionError> {
    let response: CameraResponse = serde_json::from_slice(payload)
        .map_err(|e| FusionError::malformed(Channel::CameraResponses.name(), e.to_string()))?;

    if response.correlation_id.is_empty() {
        return Err(FusionError::malformed(
            Channel::CameraResponses.name(),
            "empty correlation_id",
        ));
    }
    if !(0.0..=1.0).contains(&response.confidence) {
        return Err(FusionError::malformed(
            Channel::CameraResponses.name(),
            format!("confidence out of range: {}", response.confidence),
        ));
    }

    Ok(response)
}
