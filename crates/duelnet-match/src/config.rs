//! Match rules and physics tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How a match is won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoringMode {
    /// First combatant to land `target` hits wins. Participant 1 wins a tie.
    HitCount { target: u32 },
    /// A combatant wins when its opponent's health reaches zero.
    HealthDepletion,
}

impl Default for ScoringMode {
    fn default() -> Self {
        Self::HitCount { target: 10 }
    }
}

/// Movement constants, in pixels and pixels per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Physics {
    pub gravity: f64,
    /// Vertical velocity applied on jump; negative is up.
    pub jump_velocity: f64,
    pub move_speed: f64,
    pub ground_y: f64,
    pub arena_min_x: f64,
    pub arena_max_x: f64,
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            gravity: 0.5,
            jump_velocity: -15.0,
            move_speed: 5.0,
            ground_y: 400.0,
            arena_min_x: 15.0,
            arena_max_x: 785.0,
        }
    }
}

/// Everything that parameterizes one match.
///
/// Plain data so it can be loaded from a file:
///
/// ```
/// let cfg: duelnet_match::MatchConfig =
///     serde_json::from_str(r#"{"scoring":{"mode":"health_depletion"}}"#).unwrap();
/// assert_eq!(cfg.damage_per_hit, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub scoring: ScoringMode,
    pub max_health: u32,
    pub damage_per_hit: u32,
    /// How long an attack box stays live after a trigger.
    pub windup_ms: u64,
    /// How long after a landed hit before the attacker can score again.
    pub cooldown_ms: u64,
    pub physics: Physics,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringMode::default(),
            max_health: 100,
            damage_per_hit: 1,
            windup_ms: 150,
            cooldown_ms: 1000,
            physics: Physics::default(),
        }
    }
}

impl MatchConfig {
    /// Fixes values that would make a match unwinnable or degenerate.
    pub fn validated(mut self) -> Self {
        if let ScoringMode::HitCount { target } = &mut self.scoring {
            if *target == 0 {
                warn!("hit target of 0 would end every match at once, using 1");
                *target = 1;
            }
        }
        if self.max_health == 0 {
            warn!("max_health of 0, using 1");
            self.max_health = 1;
        }
        if self.physics.arena_min_x > self.physics.arena_max_x {
            warn!("arena bounds inverted, swapping");
            std::mem::swap(&mut self.physics.arena_min_x, &mut self.physics.arena_max_x);
        }
        self
    }

    pub fn windup(&self) -> Duration {
        Duration::from_millis(self.windup_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_arena_tuning() {
        let cfg = MatchConfig::default();
        assert_eq!(cfg.scoring, ScoringMode::HitCount { target: 10 });
        assert_eq!(cfg.windup(), Duration::from_millis(150));
        assert_eq!(cfg.cooldown(), Duration::from_secs(1));
        assert_eq!(cfg.physics.ground_y, 400.0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg: MatchConfig =
            serde_json::from_str(r#"{"scoring":{"mode":"hit_count","target":3},"physics":{"gravity":1.0}}"#)
                .unwrap();
        assert_eq!(cfg.scoring, ScoringMode::HitCount { target: 3 });
        assert_eq!(cfg.physics.gravity, 1.0);
        assert_eq!(cfg.physics.move_speed, 5.0);
        assert_eq!(cfg.max_health, 100);
    }

    #[test]
    fn test_validated_repairs_degenerate_values() {
        let cfg = MatchConfig {
            scoring: ScoringMode::HitCount { target: 0 },
            max_health: 0,
            ..MatchConfig::default()
        }
        .validated();
        assert_eq!(cfg.scoring, ScoringMode::HitCount { target: 1 });
        assert_eq!(cfg.max_health, 1);
    }
}
