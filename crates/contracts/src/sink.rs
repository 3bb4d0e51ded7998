//! EventSink trait - Dispatch Sink output interface.
//!
//! Defines the abstract interface for downstream delivery targets.

use crate::{ConsolidatedEvent, FusionError};

/// Consolidated-event delivery trait.
///
/// All sink implementations must implement this trait. Delivery is
/// at-least-once per target; idempotency (keyed by correlation id) is the
/// target's responsibility.
#[trait_variant::make(EventSink: Send)]
pub trait LocalEventSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one consolidated event
    ///
    /// # Errors
    /// Returns a write error (should include context); the dispatch worker
    /// retries with backoff.
    async fn write(&mut self, event: &ConsolidatedEvent) -> Result<(), FusionError>;

    /// Flush buffered output (if any)
    async fn flush(&mut self) -> Result<(), FusionError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), FusionError>;
}
