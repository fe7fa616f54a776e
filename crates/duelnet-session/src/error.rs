//! Error types for the session layer.

use duelnet_protocol::ProtocolError;
use duelnet_transport::TransportError;

/// Errors that can occur while connecting or talking to the relay.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A single connection attempt failed. Retryable.
    #[error("could not connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: TransportError,
    },

    /// Every attempt of a reconnect run failed. Terminal until the caller
    /// starts a new run.
    #[error("gave up connecting after {attempts} attempts")]
    MaxRetriesReached { attempts: u32 },

    /// The session has no live connection to send on.
    #[error("not connected")]
    NotConnected,

    /// An outbound message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
