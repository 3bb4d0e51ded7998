//! # Ingestion
//!
//! Inbound message intake module.
//!
//! Responsibilities:
//! - Register message sources (mock or live transports)
//! - Decode and validate raw payloads into typed messages
//! - Backpressure management and drop policy
//! - Send to the correlation core via async-channel
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{BackpressureConfig, MessageIntake, MockRadarSource};
//!
//! let mut intake = MessageIntake::new(BackpressureConfig::default());
//! intake.register_source(Box::new(MockRadarSource::with_rate(2.0)));
//! intake.start_all();
//!
//! let rx = intake.take_radar_receiver().unwrap();
//! while let Ok(detection) = rx.recv().await {
//!     // Hand off to the correlator
//! }
//! ```

mod config;
mod decode;
mod intake;
mod mock;

// Re-exports
pub use config::{BackpressureConfig, DropPolicy, IntakeMetrics, MetricsSnapshot};
pub use decode::{decode_camera_response, decode_radar_detection};
pub use intake::MessageIntake;
pub use mock::{
    MockCameraConfig, MockCameraResponder, MockRadarConfig, MockRadarSource, NullCameraPublisher,
};
