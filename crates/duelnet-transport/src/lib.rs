//! Transport abstraction layer for duelnet.
//!
//! Provides the [`Transport`], [`Connection`] and [`Connector`] traits that
//! abstract over the byte-stream protocol carrying duel messages. The relay
//! accepts through a [`Transport`]; each player dials through a
//! [`Connector`]. Both ends then talk through a [`Connection`].
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket-over-TCP transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    ClientConnection, WebSocketConnection, WebSocketConnector,
    WebSocketTransport, DEFAULT_PORT_SCAN_RANGE,
};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The address the transport is actually listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// Dials a remote endpoint and produces a [`Connection`].
///
/// The returned future is `Send` so a reconnect loop can own the connector
/// inside a spawned task.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced on success.
    type Connection: Connection;
    /// The error type for a failed dial.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens a connection to `addr` (`host:port`).
    fn connect(
        &self,
        addr: &str,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single connection that can send and receive framed byte messages.
///
/// Sending and receiving may run concurrently from different tasks: a
/// receive loop parked in [`recv`](Connection::recv) never blocks a writer.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one framed message to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next framed message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
