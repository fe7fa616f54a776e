//! The relay: accepts players and forwards every frame to everyone else.
//!
//! The relay never interprets game traffic. A frame read from one client
//! is queued, unchanged, to every other registered client:
//!
//! ```text
//!   client A ──recv──► receive task A ──broadcast(exclude A)──┬──► writer B ──► client B
//!                                                             └──► writer C ──► client C
//! ```
//!
//! Every client gets its own receive task and writer task, so a slow or
//! broken client only ever stalls itself.

use std::net::SocketAddr;
use std::sync::Arc;

use duelnet_protocol::{Codec, JsonCodec, Message};
use duelnet_transport::{Connection, ConnectionId, Transport, TransportError, WebSocketTransport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::registry::{ClientHandle, Registry, SharedFrame};
use crate::{RelayConfig, RelayError};

/// A bound relay, ready to accept players.
pub struct Relay {
    transport: WebSocketTransport,
    local_addr: SocketAddr,
    registry: Arc<Registry>,
    config: RelayConfig,
}

impl Relay {
    /// Binds the listener, scanning upward from `config.port` past ports
    /// that are already in use.
    ///
    /// # Errors
    /// [`TransportError::NoFreePort`] (wrapped) when the whole range is
    /// taken, or any other bind error.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let transport =
            WebSocketTransport::bind_scanning(&config.host, config.port, config.port_scan_range)
                .await?;
        let local_addr = transport.local_addr()?;
        info!(%local_addr, "relay listening");
        Ok(Self {
            transport,
            local_addr,
            registry: Arc::new(Registry::new()),
            config,
        })
    }

    /// The port actually bound, which may differ from the one requested.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Waits for the next player, registers it and starts its tasks.
    pub async fn accept(&mut self) -> Result<ClientHandle, RelayError> {
        let conn = Arc::new(self.transport.accept().await?);
        let id = conn.id();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ClientHandle::new(id, tx);

        self.registry.insert(handle.clone());
        tokio::spawn(receive_loop(
            Arc::clone(&conn),
            Arc::clone(&self.registry),
            self.config.inspect,
        ));
        tokio::spawn(write_loop(conn, rx));

        info!(%id, clients = self.registry.len(), "player joined relay");
        Ok(handle)
    }

    /// Queues `frame` to every client except `exclude`. See
    /// [`Registry::broadcast`].
    pub fn broadcast(&self, frame: &[u8], exclude: Option<ConnectionId>) -> usize {
        self.registry.broadcast(&SharedFrame::from(frame), exclude)
    }

    /// Deregisters a client. Idempotent.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.registry.remove(id)
    }

    /// Accepts players forever. Accept errors are logged and skipped.
    pub async fn run(mut self) {
        loop {
            if let Err(e) = self.accept().await {
                warn!(error = %e, "accept failed");
            }
        }
    }

    /// Runs [`run`](Self::run) on its own task.
    pub fn spawn(self) -> RelayHandle {
        let local_addr = self.local_addr;
        let registry = Arc::clone(&self.registry);
        let task = tokio::spawn(self.run());
        RelayHandle {
            local_addr,
            registry,
            task,
        }
    }
}

/// Control handle for a relay running on a background task.
pub struct RelayHandle {
    local_addr: SocketAddr,
    registry: Arc<Registry>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    /// Stops accepting and drops every client. Idempotent.
    pub fn shutdown(&self) {
        if !self.task.is_finished() {
            info!(port = self.port(), "relay shutting down");
        }
        self.task.abort();
        self.registry.clear();
    }
}

async fn receive_loop<C>(conn: Arc<C>, registry: Arc<Registry>, inspect: bool)
where
    C: Connection<Error = TransportError>,
{
    let id = conn.id();
    loop {
        match conn.recv().await {
            Ok(Some(bytes)) => {
                if inspect {
                    trace_frame(id, &bytes);
                }
                let frame = SharedFrame::from(bytes);
                registry.broadcast(&frame, Some(id));
            }
            Ok(None) => {
                debug!(%id, "player closed connection");
                break;
            }
            Err(e) => {
                warn!(%id, error = %e, "read from player failed");
                break;
            }
        }
    }
    if registry.remove(id) {
        info!(%id, clients = registry.len(), "player left relay");
    }
}

async fn write_loop<C>(conn: Arc<C>, mut rx: mpsc::UnboundedReceiver<SharedFrame>)
where
    C: Connection<Error = TransportError>,
{
    let id = conn.id();
    while let Some(frame) = rx.recv().await {
        if let Err(e) = conn.send(&frame).await {
            warn!(%id, error = %e, "write to player failed");
            return;
        }
    }
    if let Err(e) = conn.close().await {
        debug!(%id, error = %e, "close failed");
    }
}

fn trace_frame(id: ConnectionId, bytes: &[u8]) {
    match JsonCodec.decode::<Message>(bytes) {
        Ok(msg) => trace!(
            %id,
            kind = %msg.kind(),
            origin = %msg.origin(),
            sent_at = msg.sent_at(),
            "forwarding"
        ),
        Err(e) => trace!(%id, error = %e, bytes = bytes.len(), "forwarding undecodable frame"),
    }
}
