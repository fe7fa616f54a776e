//! Unified error type for duelnet.

use duelnet_protocol::ProtocolError;
use duelnet_relay::RelayError;
use duelnet_session::SessionError;
use duelnet_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DuelError {
    /// A transport-level error (bind, connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (connect, retries exhausted, not connected).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The in-process relay could not start.
    #[error(transparent)]
    Relay(#[from] RelayError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: DuelError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, DuelError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: DuelError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, DuelError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err: DuelError = SessionError::MaxRetriesReached { attempts: 5 }.into();
        assert!(matches!(err, DuelError::Session(_)));
        assert!(err.to_string().contains("5 attempts"));
    }

    #[test]
    fn test_from_relay_error() {
        let err: DuelError =
            RelayError::from(TransportError::NoFreePort { first: 5000, last: 5100 }).into();
        assert!(matches!(err, DuelError::Relay(_)));
        assert!(err.to_string().contains("5000..=5100"));
    }
}
