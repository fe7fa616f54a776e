//! Combat rules and network reconciliation for duelnet.
//!
//! Pure game logic with no I/O. The driver feeds a [`Reconciler`] one tick
//! at a time with the local player's [`InputIntents`] and whatever messages
//! the session received, and gets back the messages to send plus a
//! [`Frame`] to render.
//!
//! ```text
//! inbound Messages ─┐
//!                   ├─► Reconciler::tick ─► TickOutput { outbound, events }
//! InputIntents ─────┘          │
//!                              └─► Reconciler::frame ─► Frame
//! ```

mod combatant;
mod config;
mod reconciler;

pub use combatant::{AttackPhase, Combatant, Rect};
pub use config::{MatchConfig, Physics, ScoringMode};
pub use reconciler::{
    CombatantView, Frame, InputIntents, MatchEvent, MatchPhase, Reconciler, TickOutput,
};
