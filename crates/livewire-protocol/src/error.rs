//! Error types for the protocol layer.

/// Failures turning envelopes into frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),
}
