//! The session: one player's managed connection to the relay.
//!
//! Connection state lives on a [`watch`] channel so the driver (or a UI)
//! can observe transitions without polling:
//!
//! ```text
//!                 connect / retry
//!  Disconnected ───────────────────→ Connecting { attempt }
//!       ↑                               │           │
//!       │ disconnect / peer closed      │ ok        │ dial failed
//!       │                               ▼           ▼
//!       └──────────────────────────  Connected    Failed { ConnectFailed }
//!                                       │           │ (retry run exhausted)
//!                          read/write   │           ▼
//!                          error        ▼         Failed { MaxRetriesReached }
//!                                 Failed { Transport }
//! ```
//!
//! Each live connection has exactly two tasks. The receive task decodes
//! frames into the inbound queue; the writer task drains the outbound
//! queue onto the wire. Neither touches game state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use duelnet_protocol::{Codec, JsonCodec, Message, ProtocolError};
use duelnet_transport::{Connection, ConnectionId, Connector, TransportError, WebSocketConnector};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::{SessionConfig, SessionError};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Why a session is in [`SessionState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The last dial failed.
    ConnectFailed,
    /// An established connection broke while reading or writing.
    Transport,
    /// A retry run used up all its attempts. No further automatic retries.
    MaxRetriesReached,
}

/// Where the session is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected,
    Failed { reason: FailureReason },
}

impl SessionState {
    /// Human-readable status line for a frontend.
    pub fn status_text(&self) -> &'static str {
        match self {
            Self::Disconnected | Self::Failed { reason: FailureReason::Transport } => {
                "Disconnected"
            }
            Self::Connecting { .. } => "Connecting...",
            Self::Connected => "Connected to server",
            Self::Failed { reason: FailureReason::ConnectFailed } => {
                "Connection failed - Retrying..."
            }
            Self::Failed { reason: FailureReason::MaxRetriesReached } => {
                "Connection failed - Max retries reached"
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// The live connection's outbound queue and receive task.
struct Link {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    reader: JoinHandle<()>,
}

/// Everything the session's background tasks need.
struct Shared<C, K> {
    config: SessionConfig,
    endpoint: String,
    connector: C,
    codec: K,
    state: watch::Sender<SessionState>,
    attempts: AtomicU32,
    inbound: mpsc::UnboundedSender<Message>,
    link: Mutex<LinkSlot>,
}

/// The live link plus a generation that every `disconnect` bumps.
///
/// A dial remembers the generation it started under and may only install
/// its connection, or publish state, while that generation is current.
#[derive(Default)]
struct LinkSlot {
    generation: u64,
    /// `None` whenever there is no usable connection.
    link: Option<Link>,
}

impl<C, K> Shared<C, K>
where
    C: Connector<Error = TransportError>,
    C::Connection: Connection<Error = TransportError>,
    K: Codec,
{
    fn set_state(&self, next: SessionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(endpoint = %self.endpoint, ?prev, ?next, "session state changed");
        }
    }

    fn generation(&self) -> u64 {
        self.link.lock().generation
    }

    /// Publishes `next` unless a disconnect has happened since `generation`.
    fn set_state_in(&self, generation: u64, next: SessionState) -> bool {
        let slot = self.link.lock();
        if slot.generation != generation {
            return false;
        }
        self.set_state(next);
        true
    }

    /// One dial under `generation`. Installs the connection on success.
    async fn attempt(self: &Arc<Self>, generation: u64) -> Result<(), SessionError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.set_state_in(generation, SessionState::Connecting { attempt }) {
            return Err(SessionError::NotConnected);
        }
        debug!(endpoint = %self.endpoint, attempt, "dialing relay");

        match self.connector.connect(&self.endpoint).await {
            Ok(conn) => {
                let Some(id) = self.install(conn, generation) else {
                    info!(endpoint = %self.endpoint, attempt, "disconnected while dialing");
                    return Err(SessionError::NotConnected);
                };
                info!(endpoint = %self.endpoint, attempt, %id, "connected to relay");
                Ok(())
            }
            Err(source) => {
                warn!(endpoint = %self.endpoint, attempt, error = %source, "connect failed");
                self.set_state_in(
                    generation,
                    SessionState::Failed { reason: FailureReason::ConnectFailed },
                );
                Err(SessionError::Connect { address: self.endpoint.clone(), source })
            }
        }
    }

    async fn retry_run(self: Arc<Self>, generation: u64) {
        let policy = self.config.reconnect.clone();
        let max = policy.max_attempts.max(1);
        for attempt in 1..=max {
            if self.attempt(generation).await.is_ok() || self.generation() != generation {
                return;
            }
            if attempt < max {
                tokio::time::sleep(policy.retry_delay).await;
            }
        }
        warn!(endpoint = %self.endpoint, attempts = max, "giving up on relay");
        self.set_state_in(
            generation,
            SessionState::Failed { reason: FailureReason::MaxRetriesReached },
        );
    }

    /// Spawns the receive and writer tasks for a fresh connection and
    /// publishes `Connected`.
    ///
    /// Returns `None` without spawning anything if a disconnect has
    /// happened since `generation`; the connection is closed instead.
    fn install(self: &Arc<Self>, conn: C::Connection, generation: u64) -> Option<ConnectionId> {
        let conn = Arc::new(conn);
        let id = conn.id();

        // Held while spawning so a connection that dies immediately can't
        // tear down before it is registered.
        let mut slot = self.link.lock();
        if slot.generation != generation {
            drop(slot);
            tokio::spawn(async move {
                if let Err(e) = conn.close().await {
                    debug!(%id, error = %e, "close of abandoned dial failed");
                }
            });
            return None;
        }

        let (outbound, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(Self::read_loop(Arc::clone(self), Arc::clone(&conn)));
        tokio::spawn(Self::write_loop(Arc::clone(self), conn, rx));
        if let Some(old) = slot.link.replace(Link { id, outbound, reader }) {
            old.reader.abort();
        }
        self.set_state(SessionState::Connected);
        Some(id)
    }

    /// Drops the link if it is still `id` and moves to `next`.
    fn end_link(&self, id: ConnectionId, next: SessionState) {
        let mut slot = self.link.lock();
        if slot.link.as_ref().is_some_and(|link| link.id == id) {
            if let Some(link) = slot.link.take() {
                link.reader.abort();
            }
            drop(slot);
            self.set_state(next);
        }
    }

    fn decode(&self, frame: &[u8]) -> Result<Message, ProtocolError> {
        let msg: Message = self.codec.decode(frame)?;
        msg.validate()?;
        Ok(msg)
    }

    async fn read_loop(shared: Arc<Self>, conn: Arc<C::Connection>) {
        let id = conn.id();
        loop {
            match conn.recv().await {
                Ok(Some(frame)) => match shared.decode(&frame) {
                    Ok(msg) => {
                        trace!(%id, kind = %msg.kind(), origin = %msg.origin(), "received");
                        if shared.inbound.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(%id, error = %e, "dropping malformed message"),
                },
                Ok(None) => {
                    info!(%id, "relay closed the connection");
                    shared.end_link(id, SessionState::Disconnected);
                    break;
                }
                Err(e) => {
                    warn!(%id, error = %e, "connection lost");
                    shared.end_link(id, SessionState::Failed { reason: FailureReason::Transport });
                    break;
                }
            }
        }
    }

    async fn write_loop(
        shared: Arc<Self>,
        conn: Arc<C::Connection>,
        mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) {
        let id = conn.id();
        while let Some(frame) = rx.recv().await {
            if let Err(e) = conn.send(&frame).await {
                warn!(%id, error = %e, "send failed, dropping connection");
                shared.end_link(id, SessionState::Failed { reason: FailureReason::Transport });
                return;
            }
        }
        // Outbound queue closed: the link was dropped on purpose.
        if let Err(e) = conn.close().await {
            debug!(%id, error = %e, "close after disconnect failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A player's connection to the relay plus its inbound message queue.
///
/// All methods take `&self`; the session can be shared behind an `Arc` and
/// [`disconnect`](Self::disconnect)ed from any thread.
pub struct Session<C = WebSocketConnector, K = JsonCodec> {
    shared: Arc<Shared<C, K>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Message>>,
    retry_task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// A WebSocket + JSON session. Starts `Disconnected`.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_connector(config, WebSocketConnector::default(), JsonCodec)
    }
}

impl<C, K> Session<C, K>
where
    C: Connector<Error = TransportError>,
    C::Connection: Connection<Error = TransportError>,
    K: Codec,
{
    pub fn with_connector(config: SessionConfig, connector: C, codec: K) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SessionState::Disconnected);
        let shared = Shared {
            endpoint: config.endpoint(),
            config,
            connector,
            codec,
            state,
            attempts: AtomicU32::new(0),
            inbound: inbound_tx,
            link: Mutex::new(LinkSlot::default()),
        };
        Self {
            shared: Arc::new(shared),
            inbound: Mutex::new(inbound_rx),
            retry_task: Mutex::new(None),
        }
    }

    /// Makes a single connection attempt.
    ///
    /// # Errors
    /// [`SessionError::Connect`] if the dial fails; the state is then
    /// `Failed { ConnectFailed }`.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let generation = self.shared.generation();
        self.shared.attempt(generation).await
    }

    /// Starts a background retry run unless one is already in flight.
    ///
    /// The run dials up to `max_attempts` times, sleeping `retry_delay`
    /// between failures, and ends in `Failed { MaxRetriesReached }` if none
    /// succeeds.
    pub fn connect_with_retry(&self) {
        let mut slot = self.retry_task.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!(endpoint = %self.shared.endpoint, "retry run already in flight");
            return;
        }
        self.shared.attempts.store(0, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let generation = shared.generation();
        *slot = Some(tokio::spawn(shared.retry_run(generation)));
    }

    fn retry_in_flight(&self) -> bool {
        self.retry_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn is_settled(&self, state: SessionState) -> bool {
        match state {
            SessionState::Connected
            | SessionState::Failed { reason: FailureReason::MaxRetriesReached } => true,
            SessionState::Connecting { .. } => false,
            SessionState::Disconnected | SessionState::Failed { .. } => !self.retry_in_flight(),
        }
    }

    /// Waits until the session is connected or has stopped trying.
    pub async fn wait_until_settled(&self) -> SessionState {
        let mut rx = self.shared.state.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            if self.is_settled(state) {
                return state;
            }
            if rx.changed().await.is_err() {
                return self.state();
            }
        }
    }

    /// Like [`wait_until_settled`](Self::wait_until_settled) but as a
    /// `Result`.
    ///
    /// # Errors
    /// [`SessionError::MaxRetriesReached`] after an exhausted retry run,
    /// [`SessionError::NotConnected`] for any other unconnected outcome.
    pub async fn wait_until_connected(&self) -> Result<(), SessionError> {
        match self.wait_until_settled().await {
            SessionState::Connected => Ok(()),
            SessionState::Failed { reason: FailureReason::MaxRetriesReached } => {
                Err(SessionError::MaxRetriesReached { attempts: self.attempts() })
            }
            _ => Err(SessionError::NotConnected),
        }
    }

    /// Encodes `msg` and queues it for the writer task. Never waits on the
    /// network.
    ///
    /// # Errors
    /// [`SessionError::NotConnected`] when there is no live connection (the
    /// message is dropped), [`SessionError::Protocol`] if encoding fails.
    pub fn send_message(&self, msg: &Message) -> Result<(), SessionError> {
        let frame = self.shared.codec.encode(msg)?;

        let slot = self.shared.link.lock();
        let Some(link) = slot.link.as_ref() else {
            trace!(kind = %msg.kind(), "not connected, dropping outbound message");
            return Err(SessionError::NotConnected);
        };
        if link.outbound.send(frame).is_err() {
            let id = link.id;
            drop(slot);
            warn!(%id, "writer task gone, dropping connection");
            self.shared
                .end_link(id, SessionState::Failed { reason: FailureReason::Transport });
            return Err(SessionError::NotConnected);
        }
        Ok(())
    }

    /// Pops the next received message, if any. Never blocks.
    pub fn next_message(&self) -> Option<Message> {
        self.inbound.lock().try_recv().ok()
    }

    /// Discards everything waiting in the inbound queue. Returns how many
    /// messages were dropped.
    pub fn drain_pending(&self) -> usize {
        let mut rx = self.inbound.lock();
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "drained pending inbound messages");
        }
        dropped
    }

    /// Cancels any retry run and closes the connection. Idempotent.
    pub fn disconnect(&self) {
        if let Some(task) = self.retry_task.lock().take() {
            task.abort();
        }
        let mut slot = self.shared.link.lock();
        slot.generation += 1;
        if let Some(link) = slot.link.take() {
            link.reader.abort();
            info!(id = %link.id, "disconnected from relay");
        }
        self.shared.set_state(SessionState::Disconnected);
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub fn status_text(&self) -> &'static str {
        self.state().status_text()
    }

    /// Attempts made by the current retry run, or since the session was
    /// created if no run was started.
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }
}

impl<C, K> Drop for Session<C, K> {
    fn drop(&mut self) {
        if let Some(task) = self.retry_task.get_mut().take() {
            task.abort();
        }
        let mut slot = self.shared.link.lock();
        slot.generation += 1;
        if let Some(link) = slot.link.take() {
            link.reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(SessionState::Connecting { attempt: 2 }.status_text(), "Connecting...");
        assert_eq!(SessionState::Connected.status_text(), "Connected to server");
        assert_eq!(
            SessionState::Failed { reason: FailureReason::ConnectFailed }.status_text(),
            "Connection failed - Retrying..."
        );
        assert_eq!(
            SessionState::Failed { reason: FailureReason::MaxRetriesReached }.status_text(),
            "Connection failed - Max retries reached"
        );
        assert_eq!(SessionState::Disconnected.status_text(), "Disconnected");
    }

    #[test]
    fn test_new_session_starts_disconnected() {
        let session = Session::new(SessionConfig::default());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.attempts(), 0);
        assert!(session.next_message().is_none());
        assert_eq!(session.config().endpoint(), "127.0.0.1:5000");
    }
}
