//! CameraRequestPublisher trait - outbound camera-request seam.

use crate::{CameraRequest, FusionError};

/// Outbound publisher for the `camera-requests` channel.
///
/// Fire-and-forget: the Correlator never awaits an acknowledgement, and a
/// publish failure is never fatal to detection reporting (the pending
/// correlation simply expires into a radar-only event).
#[trait_variant::make(CameraRequestPublisher: Send)]
pub trait LocalCameraRequestPublisher {
    /// Publish one camera request.
    ///
    /// # Errors
    /// Returns a transport error; callers log and continue.
    async fn publish(&self, request: &CameraRequest) -> Result<(), FusionError>;
}
