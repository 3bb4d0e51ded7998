//! Layered error definitions
//!
//! Categorized by source: config / ingest / correlation / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum FusionError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Ingestion Errors =====
    /// Inbound payload failed decode or field validation
    #[error("malformed message on '{channel}': {message}")]
    MalformedMessage { channel: String, message: String },

    // ===== Correlation Errors =====
    /// Id-generation fault: a fresh id collided with a live pending entry
    #[error("duplicate correlation id '{correlation_id}' within retention window")]
    DuplicateCorrelation { correlation_id: String },

    /// Camera-request publish failure (transport)
    #[error("camera request publish failed for '{correlation_id}': {message}")]
    PublishFailure {
        correlation_id: String,
        message: String,
    },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl FusionError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create malformed-message error
    pub fn malformed(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create publish-failure error
    pub fn publish_failure(
        correlation_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::PublishFailure {
            correlation_id: correlation_id.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
