//! Error types for the relay.

use duelnet_transport::TransportError;

/// Errors that can occur while binding or accepting.
///
/// Per-client read and write failures never surface here: they only
/// remove that client from the registry.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Binding, port scanning or accepting failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
