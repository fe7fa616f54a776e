//! Combatant state and hit geometry.

use std::time::Duration;

use duelnet_protocol::{Facing, ParticipantId, Point};

use crate::config::{MatchConfig, Physics};

/// Axis-aligned rectangle; `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    /// Overlap test that counts touching edges as a hit.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.x + other.w
            && other.x <= self.x + self.w
            && self.y <= other.y + other.h
            && other.y <= self.y + self.h
    }
}

/// Where a combatant is in its attack cycle. Deadlines are match-clock
/// instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttackPhase {
    #[default]
    Idle,
    /// Attack box is live until the deadline.
    Windup { until: Duration },
    /// Just landed a hit; cannot score again until the deadline.
    Cooldown { until: Duration },
}

impl AttackPhase {
    /// Drops back to `Idle` once the current deadline has passed.
    pub(crate) fn expire(&mut self, now: Duration) {
        match *self {
            Self::Windup { until } | Self::Cooldown { until } if now >= until => {
                *self = Self::Idle;
            }
            _ => {}
        }
    }
}

/// One of the two fighters.
#[derive(Debug, Clone, PartialEq)]
pub struct Combatant {
    id: ParticipantId,
    name: String,
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) velocity_y: f64,
    pub(crate) grounded: bool,
    pub(crate) health: u32,
    pub(crate) hits: u32,
    pub(crate) facing: Facing,
    /// Attack pose as last shown. For the local combatant this tracks the
    /// windup; for the remote one it mirrors the peer's reports.
    pub(crate) attacking: bool,
    pub(crate) phase: AttackPhase,
}

impl Combatant {
    /// Starting spot and look for a participant.
    pub fn spawn(id: ParticipantId, config: &MatchConfig) -> Self {
        let (x, facing, name) = if id == ParticipantId::HOST {
            (200.0, Facing::Right, "Player 1")
        } else {
            (600.0, Facing::Left, "Player 2")
        };
        Self {
            id,
            name: name.to_owned(),
            x,
            y: config.physics.ground_y,
            velocity_y: 0.0,
            grounded: true,
            health: config.max_health,
            hits: 0,
            facing,
            attacking: false,
            phase: AttackPhase::Idle,
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn is_attacking(&self) -> bool {
        self.attacking
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn phase(&self) -> AttackPhase {
        self.phase
    }

    /// 30×80 hurtbox.
    pub fn body_box(&self) -> Rect {
        Rect { x: self.x - 15.0, y: self.y - 20.0, w: 30.0, h: 80.0 }
    }

    /// 40×30 hitbox on the side the combatant faces.
    pub fn attack_box(&self) -> Rect {
        let x = match self.facing {
            Facing::Right => self.x + 5.0,
            Facing::Left => self.x - 45.0,
        };
        Rect { x, y: self.y, w: 40.0, h: 30.0 }
    }

    pub(crate) fn take_damage(&mut self, amount: u32) {
        self.health = self.health.saturating_sub(amount);
    }

    /// Horizontal input, jump, then gravity and the arena limits.
    pub(crate) fn step_physics(&mut self, dx: f64, jump: bool, physics: &Physics) {
        if dx < 0.0 {
            self.facing = Facing::Left;
        } else if dx > 0.0 {
            self.facing = Facing::Right;
        }
        self.x += dx;

        if jump && self.grounded {
            self.velocity_y = physics.jump_velocity;
            self.grounded = false;
        }

        self.velocity_y += physics.gravity;
        self.y += self.velocity_y;
        if self.y >= physics.ground_y {
            self.y = physics.ground_y;
            self.velocity_y = 0.0;
            self.grounded = true;
        }

        self.x = self.x.clamp(physics.arena_min_x, physics.arena_max_x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Combatant {
        Combatant::spawn(ParticipantId::HOST, &MatchConfig::default())
    }

    #[test]
    fn test_spawn_positions() {
        let p1 = host();
        let p2 = Combatant::spawn(ParticipantId::GUEST, &MatchConfig::default());
        assert_eq!(p1.position(), Point::new(200.0, 400.0));
        assert_eq!(p2.position(), Point::new(600.0, 400.0));
        assert_eq!(p1.name(), "Player 1");
        assert_eq!(p2.name(), "Player 2");
        assert_eq!(p1.health(), 100);
        assert!(p1.is_grounded());
    }

    #[test]
    fn test_attack_box_follows_facing() {
        let mut c = host();
        assert_eq!(c.attack_box(), Rect { x: 205.0, y: 400.0, w: 40.0, h: 30.0 });
        c.facing = Facing::Left;
        assert_eq!(c.attack_box().x, 155.0);
    }

    #[test]
    fn test_touching_edges_intersect() {
        let a = Rect { x: 0.0, y: 0.0, w: 10.0, h: 10.0 };
        let b = Rect { x: 10.0, y: 10.0, w: 5.0, h: 5.0 };
        let c = Rect { x: 10.1, y: 0.0, w: 5.0, h: 5.0 };
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_jump_rises_then_lands() {
        let physics = Physics::default();
        let mut c = host();
        c.step_physics(0.0, true, &physics);
        assert!(!c.is_grounded());
        assert_eq!(c.position().y, 400.0 - 14.5);

        for _ in 0..200 {
            c.step_physics(0.0, false, &physics);
        }
        assert!(c.is_grounded());
        assert_eq!(c.position().y, 400.0);
    }

    #[test]
    fn test_arena_clamp_and_facing() {
        let physics = Physics::default();
        let mut c = host();
        for _ in 0..100 {
            c.step_physics(-physics.move_speed, false, &physics);
        }
        assert_eq!(c.position().x, 15.0);
        assert_eq!(c.facing(), Facing::Left);
    }

    #[test]
    fn test_damage_saturates_at_zero() {
        let mut c = host();
        c.take_damage(250);
        assert_eq!(c.health(), 0);
    }

    #[test]
    fn test_phase_expires_at_deadline() {
        let mut phase = AttackPhase::Cooldown { until: Duration::from_millis(100) };
        phase.expire(Duration::from_millis(99));
        assert!(matches!(phase, AttackPhase::Cooldown { .. }));
        phase.expire(Duration::from_millis(100));
        assert_eq!(phase, AttackPhase::Idle);
    }
}
