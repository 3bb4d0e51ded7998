//! Event dispatch for the traffic fusion pipeline.
//!
//! Receives consolidated events from the correlation stage and fans them
//! out to configured sinks (log, JSONL file, UDP). Each sink runs its own
//! worker with an isolated drop-oldest queue and a bounded retry policy,
//! so a slow or failing sink degrades only its own delivery.

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod queue;
pub mod sinks;

pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use queue::{DeliveryQueue, PushOutcome};
pub use sinks::{FileSink, LogSink, UdpSink, UdpSinkConfig};
