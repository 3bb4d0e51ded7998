//! # Correlation
//!
//! The sensor-fusion core: pending-correlation table, Correlator,
//! Consolidator and weather cache.
//!
//! Data flow:
//!
//! ```text
//! radar intake ──▶ Correlator ──(CorrelationOutcome)──▶ Consolidator ──▶ events
//! camera intake ──▶    │  ▲
//!                      ▼  │ deadline timers
//!                 PendingTable
//! ```
//!
//! Exactly one `ConsolidatedEvent` leaves this crate per radar trigger, no
//! matter how camera responses and deadline timers race.

mod consolidator;
mod correlator;
mod pending;
mod weather;

// Re-exports
pub use consolidator::Consolidator;
pub use correlator::{
    CorrelationOutcome, Correlator, CorrelatorMetrics, CorrelatorSnapshot, Resolution,
};
pub use pending::{PendingCorrelation, PendingTable};
pub use weather::WeatherCache;
