//! FileSink - appends events to a JSON-lines file
//!
//! The persistence collaborator's format: one JSON object per line, append
//! only, so downstream reconciliation can replay by correlation id.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use contracts::{ConsolidatedEvent, EventSink, FusionError};
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file path
    pub path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .ok_or_else(|| "missing 'path' parameter".to_string())?;
        Ok(Self { path })
    }
}

/// Sink that appends consolidated events to a JSONL file
pub struct FileSink {
    name: String,
    writer: BufWriter<File>,
    path: PathBuf,
}

impl FileSink {
    /// Create a new FileSink, creating parent directories as needed
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            writer: BufWriter::new(file),
            path: config.path,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, FusionError> {
        let name = name.into();
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| FusionError::sink_write(&name, e))?;
        Self::new(&name, config).map_err(FusionError::from)
    }

    fn append_event(&mut self, event: &ConsolidatedEvent) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl EventSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, event),
        fields(sink = %self.name, correlation_id = %event.correlation_id)
    )]
    async fn write(&mut self, event: &ConsolidatedEvent) -> Result<(), FusionError> {
        self.append_event(event).map_err(|e| {
            error!(sink = %self.name, path = %self.path.display(), error = %e, "Write failed");
            FusionError::sink_write(&self.name, e.to_string())
        })
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), FusionError> {
        self.writer
            .flush()
            .map_err(|e| FusionError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), FusionError> {
        self.writer
            .flush()
            .map_err(|e| FusionError::sink_write(&self.name, e.to_string()))?;
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
