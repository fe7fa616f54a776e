//! `DuelBuilder` launcher and the game loop driver.
//!
//! This ties the layers together for one peer: an optional in-process
//! relay (host only), a session to the relay, the reconciler and the tick
//! scheduler.

use std::time::Duration;

use duelnet_match::{MatchConfig, MatchEvent, Reconciler, ScoringMode};
use duelnet_protocol::{Message, ParticipantId};
use duelnet_relay::{Relay, RelayConfig, RelayHandle};
use duelnet_session::{ReconnectPolicy, Session, SessionConfig, SessionError};
use duelnet_tick::{TickConfig, TickScheduler};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::{DuelError, Frontend};

/// Port the relay listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 5000;

/// Builder for one peer of a duel.
///
/// # Example
///
/// ```rust,ignore
/// // Player one hosts the relay and plays against whoever joins.
/// let duel = DuelBuilder::host().port(5000).build().await?;
/// println!("share this port: {:?}", duel.relay_port());
/// duel.run(&mut my_frontend).await;
///
/// // Player two joins.
/// let duel = DuelBuilder::join("192.168.1.20").port(5000).build().await?;
/// ```
pub struct DuelBuilder {
    is_host: bool,
    address: String,
    port: u16,
    relay_host: String,
    match_config: MatchConfig,
    tick_config: TickConfig,
    reconnect: ReconnectPolicy,
}

impl DuelBuilder {
    /// A joining peer aimed at a relay on this machine.
    pub fn new() -> Self {
        Self {
            is_host: false,
            address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            relay_host: "0.0.0.0".to_string(),
            match_config: MatchConfig::default(),
            tick_config: TickConfig::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// A peer that starts the relay and plays as participant 1.
    pub fn host() -> Self {
        Self::new().is_host(true)
    }

    /// A peer that joins the relay at `address` as participant 2.
    pub fn join(address: impl Into<String>) -> Self {
        Self::new().address(address)
    }

    pub fn is_host(mut self, is_host: bool) -> Self {
        self.is_host = is_host;
        self
    }

    /// Relay address for a joining peer. Ignored when hosting, since the
    /// host always dials its own relay on loopback.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Relay port. A host scans upward from it if it is taken.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Interface the host's relay binds to.
    pub fn relay_host(mut self, host: impl Into<String>) -> Self {
        self.relay_host = host.into();
        self
    }

    pub fn scoring(mut self, scoring: ScoringMode) -> Self {
        self.match_config.scoring = scoring;
        self
    }

    pub fn match_config(mut self, config: MatchConfig) -> Self {
        self.match_config = config;
        self
    }

    pub fn tick_rate(mut self, hz: u32) -> Self {
        self.tick_config.tick_rate_hz = hz;
        self
    }

    pub fn tick_config(mut self, config: TickConfig) -> Self {
        self.tick_config = config;
        self
    }

    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Starts the relay (host only) and a retry run towards it.
    ///
    /// Returns without waiting for the connection; the local simulation
    /// runs whether or not the peer is reachable.
    ///
    /// # Errors
    /// [`DuelError::Relay`] if the host cannot bind any port in range.
    pub async fn build(self) -> Result<Duel, DuelError> {
        let (local, relay, dial_address, dial_port) = if self.is_host {
            let config = RelayConfig {
                host: self.relay_host,
                ..RelayConfig::with_port(self.port)
            };
            let relay = Relay::bind(config).await?.spawn();
            let port = relay.port();
            (ParticipantId::HOST, Some(relay), "127.0.0.1".to_string(), port)
        } else {
            (ParticipantId::GUEST, None, self.address, self.port)
        };

        let session = Session::new(SessionConfig {
            address: dial_address,
            port: dial_port,
            reconnect: self.reconnect,
        });
        session.connect_with_retry();

        info!(
            %local,
            endpoint = %session.config().endpoint(),
            hosting = relay.is_some(),
            "duel starting"
        );

        let (commands_tx, commands) = mpsc::unbounded_channel();
        Ok(Duel {
            session,
            reconciler: Reconciler::new(local, self.match_config),
            scheduler: TickScheduler::new(self.tick_config),
            relay,
            commands,
            handle: DuelHandle { tx: commands_tx },
        })
    }
}

impl Default for DuelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Requests a running duel accepts from outside its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DuelCommand {
    Restart,
    Shutdown,
}

/// Cheap, cloneable remote control for a [`Duel`].
#[derive(Debug, Clone)]
pub struct DuelHandle {
    tx: mpsc::UnboundedSender<DuelCommand>,
}

impl DuelHandle {
    /// Asks for a fresh match. The duel ignores it unless the current match
    /// is over. Returns `false` if the duel has stopped.
    pub fn restart(&self) -> bool {
        self.tx.send(DuelCommand::Restart).is_ok()
    }

    /// Asks the duel to stop. Returns `false` if it already has.
    pub fn shutdown(&self) -> bool {
        self.tx.send(DuelCommand::Shutdown).is_ok()
    }
}

/// One peer's duel: session, match state and loop cadence.
pub struct Duel {
    session: Session,
    reconciler: Reconciler,
    scheduler: TickScheduler,
    relay: Option<RelayHandle>,
    commands: mpsc::UnboundedReceiver<DuelCommand>,
    handle: DuelHandle,
}

impl Duel {
    pub fn handle(&self) -> DuelHandle {
        self.handle.clone()
    }

    pub fn local_id(&self) -> ParticipantId {
        self.reconciler.local_id()
    }

    /// The port the in-process relay bound, for the joining player.
    pub fn relay_port(&self) -> Option<u16> {
        self.relay.as_ref().map(RelayHandle::port)
    }

    pub fn status_text(&self) -> &'static str {
        self.session.status_text()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Waits for the session's first retry run to settle.
    ///
    /// # Errors
    /// [`SessionError::MaxRetriesReached`] (wrapped) if the relay could not
    /// be reached.
    pub async fn wait_connected(&self) -> Result<(), DuelError> {
        Ok(self.session.wait_until_connected().await?)
    }

    /// Drives the duel until [`DuelHandle::shutdown`] is called.
    ///
    /// Each tick drains the inbound queue into the reconciler together with
    /// the frontend's input, sends what the reconciler produced and renders
    /// the result. Game over pauses ticking until a restart; while paused
    /// the inbound queue is still drained once per period.
    pub async fn run<F: Frontend>(mut self, frontend: &mut F) {
        let mut status = self.session.subscribe();
        let mut idle_drain = tokio::time::interval(self.scheduler.period());
        idle_drain.set_missed_tick_behavior(MissedTickBehavior::Skip);
        frontend.connection_status(self.session.status_text());
        frontend.render(&self.reconciler.frame());

        loop {
            let paused = self.scheduler.is_paused();
            tokio::select! {
                Some(cmd) = self.commands.recv() => {
                    debug!(?cmd, "duel command");
                    match cmd {
                        DuelCommand::Restart => self.restart(frontend),
                        DuelCommand::Shutdown => break,
                    }
                }
                Ok(()) = status.changed() => {
                    let text = status.borrow_and_update().status_text();
                    frontend.connection_status(text);
                }
                _ = idle_drain.tick(), if paused => {
                    self.drain_while_paused(frontend);
                }
                tick = self.scheduler.wait_for_tick() => {
                    self.step(tick.dt, frontend);
                    self.scheduler.record_tick_end();
                }
            }
        }

        self.stop();
    }

    fn step<F: Frontend>(&mut self, dt: Duration, frontend: &mut F) {
        let input = frontend.poll_input();
        let session = &self.session;
        let inbound = std::iter::from_fn(|| session.next_message());
        let out = self.reconciler.tick(dt, input, inbound);

        for msg in &out.outbound {
            self.send(msg);
        }
        for event in &out.events {
            if let MatchEvent::GameOver { winner, name } = event {
                info!(%winner, %name, "match over, pausing game loop");
                self.scheduler.pause();
            }
            frontend.on_event(event);
        }
        frontend.render(&self.reconciler.frame());
    }

    /// Keeps the inbound queue from growing while ticking is paused. The
    /// finished match still takes the peer's movement but no score or
    /// health changes.
    fn drain_while_paused<F: Frontend>(&mut self, frontend: &mut F) {
        let mut applied = 0usize;
        while let Some(msg) = self.session.next_message() {
            applied += 1;
            if let Some(event) = self.reconciler.apply(&msg) {
                frontend.on_event(&event);
            }
        }
        if applied > 0 {
            trace!(applied, "drained inbound while paused");
            frontend.render(&self.reconciler.frame());
        }
    }

    fn restart<F: Frontend>(&mut self, frontend: &mut F) {
        let Some(announce) = self.reconciler.restart() else {
            debug!("restart requested mid-match, ignoring");
            return;
        };
        let dropped = self.session.drain_pending();
        self.send(&announce);
        self.scheduler.resume();
        debug!(dropped, "restarted match");
        frontend.render(&self.reconciler.frame());
    }

    fn send(&self, msg: &Message) {
        match self.session.send_message(msg) {
            Ok(()) => {}
            Err(SessionError::NotConnected) => {
                trace!(kind = %msg.kind(), "offline, message not sent");
            }
            Err(e) => warn!(kind = %msg.kind(), error = %e, "could not send message"),
        }
    }

    fn stop(&mut self) {
        self.session.disconnect();
        if let Some(relay) = &self.relay {
            relay.shutdown();
        }
        info!(local = %self.local_id(), "duel stopped");
    }
}
