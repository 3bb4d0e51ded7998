//! Built-in sink implementations

mod file;
mod log;
mod udp;

pub use file::FileSink;
pub use log::LogSink;
pub use udp::{UdpSink, UdpSinkConfig};
