//! Per-tick reconciliation of local input with messages from the peer.
//!
//! Each peer is authoritative for hits landed by its own combatant: it
//! detects them locally, applies the damage to its copy of the opponent and
//! tells the peer with a `Damage` plus a `StateSync`. Everything arriving
//! from the peer is applied with origin checks so that neither side can
//! move, damage or re-score the wrong combatant.

use std::time::Duration;

use duelnet_protocol::{Facing, Message, MessageBody, ParticipantId, Point};
use tracing::{debug, info, trace};

use crate::combatant::{AttackPhase, Combatant};
use crate::config::{MatchConfig, ScoringMode};

/// What the local player wants to do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputIntents {
    pub move_left: bool,
    pub move_right: bool,
    pub jump: bool,
    pub attack: bool,
}

/// Whether the match is still being fought.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Running,
    Finished { winner: ParticipantId },
}

/// Something the frontend or driver may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    /// The local combatant landed a hit.
    Scored { attacker: ParticipantId, hits: u32 },
    /// The peer reported an attack. `connected` is our own geometry check
    /// and does not change any score.
    IncomingAttack { from: ParticipantId, connected: bool },
    /// The local combatant took damage reported by the peer.
    DamageTaken { target: ParticipantId, amount: u32, health: u32 },
    /// Hit counts adopted from the peer.
    HitsSynced { hits: [u32; 2] },
    GameOver { winner: ParticipantId, name: String },
}

/// Messages to send and events raised during one tick.
#[derive(Debug, Default)]
pub struct TickOutput {
    pub outbound: Vec<Message>,
    pub events: Vec<MatchEvent>,
}

/// Render-ready copy of one combatant.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatantView {
    pub id: ParticipantId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub health: u32,
    pub hits: u32,
    pub attacking: bool,
    pub facing: Facing,
}

/// Everything a frontend needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub local: ParticipantId,
    /// Indexed by [`ParticipantId::index`].
    pub combatants: [CombatantView; 2],
    /// Winner's display name once the match is over.
    pub game_over: Option<String>,
}

/// Match state for one peer plus the rules that move it forward.
pub struct Reconciler {
    config: MatchConfig,
    local: ParticipantId,
    combatants: [Combatant; 2],
    phase: MatchPhase,
    /// Time since the current match started; reset on restart.
    clock: Duration,
    /// Time since this reconciler was created; stamps `sent_at`.
    uptime: Duration,
}

impl Reconciler {
    pub fn new(local: ParticipantId, config: MatchConfig) -> Self {
        let config = config.validated();
        let combatants = ParticipantId::ALL.map(|id| Combatant::spawn(id, &config));
        Self {
            config,
            local,
            combatants,
            phase: MatchPhase::Running,
            clock: Duration::ZERO,
            uptime: Duration::ZERO,
        }
    }

    pub fn local_id(&self) -> ParticipantId {
        self.local
    }

    pub fn remote_id(&self) -> ParticipantId {
        self.local.other()
    }

    pub fn combatant(&self, id: ParticipantId) -> &Combatant {
        &self.combatants[id.index()]
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, MatchPhase::Finished { .. })
    }

    pub fn hits(&self) -> [u32; 2] {
        [self.combatants[0].hits, self.combatants[1].hits]
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Runs one tick: applies everything in `inbound`, steps the local
    /// combatant with `input` and returns the messages to send.
    ///
    /// Once the match is finished only remote `Position` updates are still
    /// applied, and nothing is sent.
    pub fn tick<I>(&mut self, dt: Duration, input: InputIntents, inbound: I) -> TickOutput
    where
        I: IntoIterator<Item = Message>,
    {
        let mut out = TickOutput::default();

        self.clock += dt;
        self.uptime += dt;
        let now = self.clock;
        let local = &mut self.combatants[self.local.index()];
        local.phase.expire(now);
        local.attacking = matches!(local.phase, AttackPhase::Windup { .. });

        for msg in inbound {
            if let Some(event) = self.apply(&msg) {
                out.events.push(event);
            }
        }

        if self.is_finished() {
            return out;
        }
        if self.check_game_over(&mut out) {
            return out;
        }

        self.step_local(input, &mut out);
        self.check_game_over(&mut out);
        out
    }

    /// Applies one message from the peer.
    pub fn apply(&mut self, msg: &Message) -> Option<MatchEvent> {
        let origin = msg.origin();
        let remote = self.remote_id();
        let finished = self.is_finished();
        trace!(kind = %msg.kind(), %origin, sent_at = msg.sent_at(), "applying message");

        match *msg.body() {
            MessageBody::Position { x, y, attacking, facing } => {
                if origin != remote {
                    return None;
                }
                let c = &mut self.combatants[remote.index()];
                let inferred = if x > c.x {
                    Facing::Right
                } else if x < c.x {
                    Facing::Left
                } else {
                    c.facing
                };
                c.facing = facing.unwrap_or(inferred);
                c.x = x;
                c.y = y;
                c.attacking = attacking;
                None
            }
            MessageBody::Attack { at } => {
                if origin != remote || finished {
                    return None;
                }
                let c = &mut self.combatants[remote.index()];
                c.attacking = true;
                if let Some(Point { x, y }) = at {
                    c.x = x;
                    c.y = y;
                }
                let connected = self.combatants[remote.index()]
                    .attack_box()
                    .intersects(&self.combatants[self.local.index()].body_box());
                debug!(from = %origin, connected, "incoming attack");
                Some(MatchEvent::IncomingAttack { from: origin, connected })
            }
            MessageBody::Damage { amount } => {
                // The attacker already applied damage to its own copy of the
                // target, so only damage aimed at us is taken.
                if origin != self.local || finished {
                    return None;
                }
                let c = &mut self.combatants[self.local.index()];
                c.take_damage(amount);
                debug!(target = %origin, amount, health = c.health, "took damage");
                Some(MatchEvent::DamageTaken { target: origin, amount, health: c.health })
            }
            MessageBody::StateSync { hits } => {
                if origin != remote || finished {
                    return None;
                }
                for (c, h) in self.combatants.iter_mut().zip(hits) {
                    c.hits = h;
                }
                Some(MatchEvent::HitsSynced { hits })
            }
        }
    }

    /// Resets both combatants and the clock, and returns the zeroed
    /// `StateSync` the peer should receive.
    ///
    /// Only a finished match can be restarted; while it is running this
    /// returns `None` and changes nothing, since the peer would keep its
    /// own health and positions.
    pub fn restart(&mut self) -> Option<Message> {
        if !self.is_finished() {
            debug!(local = %self.local, "restart ignored, match still running");
            return None;
        }
        self.combatants = ParticipantId::ALL.map(|id| Combatant::spawn(id, &self.config));
        self.phase = MatchPhase::Running;
        self.clock = Duration::ZERO;
        info!(local = %self.local, "match restarted");
        Some(self.message(self.local, MessageBody::StateSync { hits: [0, 0] }))
    }

    pub fn frame(&self) -> Frame {
        let view = |c: &Combatant| CombatantView {
            id: c.id(),
            name: c.name().to_owned(),
            x: c.x,
            y: c.y,
            health: c.health,
            hits: c.hits,
            attacking: c.attacking,
            facing: c.facing,
        };
        Frame {
            local: self.local,
            combatants: [view(&self.combatants[0]), view(&self.combatants[1])],
            game_over: match self.phase {
                MatchPhase::Finished { winner } => Some(self.combatant(winner).name().to_owned()),
                MatchPhase::Running => None,
            },
        }
    }

    fn step_local(&mut self, input: InputIntents, out: &mut TickOutput) {
        let now = self.clock;
        let remote = self.remote_id();
        let physics = self.config.physics;
        let windup = self.config.windup();

        let mut dx = 0.0;
        if input.move_left {
            dx -= physics.move_speed;
        }
        if input.move_right {
            dx += physics.move_speed;
        }

        let local = &mut self.combatants[self.local.index()];
        local.step_physics(dx, input.jump, &physics);

        if input.attack && local.phase == AttackPhase::Idle {
            local.phase = AttackPhase::Windup { until: now + windup };
            local.attacking = true;
            let at = local.position();
            out.outbound.push(self.message(self.local, MessageBody::Attack { at: Some(at) }));
        }

        let local = &self.combatants[self.local.index()];
        let landed = matches!(local.phase, AttackPhase::Windup { .. })
            && local.attack_box().intersects(&self.combatants[remote.index()].body_box());
        if landed {
            self.land_hit(out);
        }

        let local = &self.combatants[self.local.index()];
        let position = MessageBody::Position {
            x: local.x,
            y: local.y,
            attacking: local.attacking,
            facing: Some(local.facing),
        };
        out.outbound.push(self.message(self.local, position));
    }

    fn land_hit(&mut self, out: &mut TickOutput) {
        let remote = self.remote_id();
        let amount = self.config.damage_per_hit;
        let until = self.clock + self.config.cooldown();

        let local = &mut self.combatants[self.local.index()];
        local.hits += 1;
        local.phase = AttackPhase::Cooldown { until };
        local.attacking = false;
        let hits = local.hits;

        self.combatants[remote.index()].take_damage(amount);
        info!(attacker = %self.local, hits, "hit landed");

        out.outbound.push(self.message(remote, MessageBody::Damage { amount }));
        out.outbound.push(self.message(self.local, MessageBody::StateSync { hits: self.hits() }));
        out.events.push(MatchEvent::Scored { attacker: self.local, hits });
    }

    /// Finishes the match if a win condition holds. Returns whether it did.
    fn check_game_over(&mut self, out: &mut TickOutput) -> bool {
        if self.is_finished() {
            return true;
        }
        let Some(winner) = self.winner() else {
            return false;
        };

        self.phase = MatchPhase::Finished { winner };
        let name = self.combatant(winner).name().to_owned();
        info!(%winner, %name, hits = ?self.hits(), "game over");
        out.outbound.push(self.message(self.local, MessageBody::StateSync { hits: self.hits() }));
        out.events.push(MatchEvent::GameOver { winner, name });
        true
    }

    fn winner(&self) -> Option<ParticipantId> {
        let [p1, p2] = &self.combatants;
        match self.config.scoring {
            ScoringMode::HitCount { target } => {
                if p1.hits >= target {
                    Some(ParticipantId::HOST)
                } else if p2.hits >= target {
                    Some(ParticipantId::GUEST)
                } else {
                    None
                }
            }
            ScoringMode::HealthDepletion => {
                if p2.health == 0 {
                    Some(ParticipantId::HOST)
                } else if p1.health == 0 {
                    Some(ParticipantId::GUEST)
                } else {
                    None
                }
            }
        }
    }

    fn message(&self, origin: ParticipantId, body: MessageBody) -> Message {
        Message::new(origin, self.uptime.as_millis() as u64, body)
    }
}
