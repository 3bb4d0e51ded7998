//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Wall-clock timestamps are `chrono::DateTime<Utc>` on every wire payload
//! - Deadline arithmetic inside the core uses monotonic `tokio::time::Instant`

mod blueprint;
mod correlation_id;
mod detection;
mod error;
mod event;
mod publisher;
mod sink;
mod source;
mod weather;

pub use blueprint::*;
pub use correlation_id::CorrelationId;
pub use detection::*;
pub use error::*;
pub use event::*;
pub use publisher::*;
pub use sink::*;
pub use source::{Channel, MessageCallback, MessageSource};
pub use weather::*;
