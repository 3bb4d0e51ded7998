//! UdpSink - fire-and-forget event broadcast
//!
//! The broadcast collaborator's feed: one JSON datagram per event,
//! best-effort. Send failures are logged, never surfaced as delivery
//! failures, so a dead listener cannot trigger retries.

use std::collections::HashMap;
use std::net::SocketAddr;

use contracts::{ConsolidatedEvent, EventSink, FusionError};
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument, warn};

/// Configuration for UdpSink
#[derive(Debug, Clone)]
pub struct UdpSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Max datagram size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
}

impl UdpSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("address")
            .ok_or_else(|| "missing 'address' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{addr_str}': {e}"))?;

        let max_packet_size = params
            .get("max_packet_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(65000);

        Ok(Self {
            addr,
            max_packet_size,
        })
    }
}

/// Sink that broadcasts events over UDP
pub struct UdpSink {
    name: String,
    config: UdpSinkConfig,
    socket: Option<UdpSocket>,
}

impl UdpSink {
    /// Create a new UdpSink
    #[instrument(name = "udp_sink_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: UdpSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        // Bind to any available port
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&config.addr).await?;

        debug!(sink = %name, target = %config.addr, "UdpSink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "udp_sink_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, FusionError> {
        let name = name.into();
        let config =
            UdpSinkConfig::from_params(params).map_err(|e| FusionError::sink_write(&name, e))?;

        Self::new(&name, config)
            .await
            .map_err(|e| FusionError::SinkConnection {
                sink_name: name,
                message: e.to_string(),
            })
    }

    fn socket(&self) -> Result<&UdpSocket, FusionError> {
        self.socket
            .as_ref()
            .ok_or_else(|| FusionError::sink_write(&self.name, "socket not connected"))
    }

    fn prepare_payload(&self, event: &ConsolidatedEvent) -> Result<Option<Vec<u8>>, FusionError> {
        let data = serde_json::to_vec(event)
            .map_err(|e| FusionError::sink_write(&self.name, e.to_string()))?;

        if data.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                correlation_id = %event.correlation_id,
                size = data.len(),
                max = self.config.max_packet_size,
                "Event too large for one datagram, skipped"
            );
            return Ok(None);
        }

        Ok(Some(data))
    }

    async fn transmit(&self, socket: &UdpSocket, data: &[u8], event: &ConsolidatedEvent) {
        match socket.send(data).await {
            Ok(sent) => {
                debug!(sink = %self.name, correlation_id = %event.correlation_id, bytes = sent, "Sent");
            }
            Err(e) => {
                // Log but don't fail - UDP is best-effort
                error!(sink = %self.name, error = %e, "UDP send failed");
            }
        }
    }
}

impl EventSink for UdpSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "udp_sink_write",
        skip(self, event),
        fields(sink = %self.name, correlation_id = %event.correlation_id)
    )]
    async fn write(&mut self, event: &ConsolidatedEvent) -> Result<(), FusionError> {
        let socket = self.socket()?;
        if let Some(data) = self.prepare_payload(event)? {
            self.transmit(socket, &data, event).await;
        }
        Ok(())
    }

    #[instrument(name = "udp_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), FusionError> {
        // UDP doesn't buffer
        Ok(())
    }

    #[instrument(name = "udp_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), FusionError> {
        self.socket = None;
        debug!(sink = %self.name, "UdpSink closed");
        Ok(())
    }
}
