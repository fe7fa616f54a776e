//! The rendering and input side of a duel.

use duelnet_match::{Frame, InputIntents, MatchEvent};

/// Whatever draws the duel and reads the player's controls.
///
/// The driver calls into it from the game loop task, once per tick for
/// input and rendering, so implementations should return quickly.
pub trait Frontend: Send {
    /// Called once at the start of every tick.
    fn poll_input(&mut self) -> InputIntents;

    /// Called once at the end of every tick, and after a restart.
    fn render(&mut self, frame: &Frame);

    /// Called with the new status line whenever the session state changes.
    fn connection_status(&mut self, status: &str);

    /// Called for every match event raised during a tick.
    fn on_event(&mut self, _event: &MatchEvent) {}
}
