//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding or validating a
/// [`Message`](crate::Message).
///
/// A `ProtocolError` always concerns a single message. Callers log it and
/// drop that message; it never tears down the connection it arrived on.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed bytes, missing fields, an unknown
    /// `kind`, or an out-of-range participant id.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but its contents break protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
