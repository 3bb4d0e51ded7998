//! CorrelationId - the join key between a radar trigger and its camera response.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque unique token tying one radar trigger to its at-most-one camera
/// response and final consolidated event.
///
/// Minted by the Correlator at trigger time; collision probability over the
/// retention window is negligible (random 128-bit token).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Mint a fresh correlation id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing token (inbound camera responses carry one verbatim).
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the token is empty (rejected at the ingestion boundary).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(token: String) -> Self {
        Self(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique() {
        let a = CorrelationId::generate();
        let b = CorrelationId::generate();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_serde_transparent() {
        let id = CorrelationId::new("abc-123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc-123\"");
        let back: CorrelationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
