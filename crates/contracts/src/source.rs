//! MessageSource trait - inbound transport abstraction.
//!
//! Decouples the intake loops from the concrete pub/sub technology. Any
//! transport that can hand raw payload bytes to a callback satisfies it;
//! the mock transports used for transport-free runs implement the same
//! interface as a live broker subscription would.

use std::sync::Arc;

use bytes::Bytes;

/// Inbound channels consumed by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Radar triggers from the radar collaborator
    RadarDetections,
    /// Classification results from the camera collaborator
    CameraResponses,
}

impl Channel {
    /// Channel name as used in logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::RadarDetections => "radar-detections",
            Channel::CameraResponses => "camera-responses",
        }
    }
}

/// Raw payload callback type.
///
/// When the transport delivers a message, it hands the undecoded payload
/// through this callback. `Arc` allows sharing across contexts.
pub type MessageCallback = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Inbound message source trait.
///
/// # Design Principles
///
/// 1. **Decoupling**: payload production is separated from consumption
/// 2. **Unified interface**: mock and live transports use the same API
/// 3. **Callback pattern**: matches how broker client libraries deliver
pub trait MessageSource: Send + Sync {
    /// Which inbound channel this source feeds
    fn channel(&self) -> Channel;

    /// Register the delivery callback and start delivering.
    ///
    /// Repeated calls while already listening must be idempotent (no
    /// second callback registered).
    fn listen(&self, callback: MessageCallback);

    /// Stop delivering messages.
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}
