//! # duelnet
//!
//! Networked two-player duels over a WebSocket relay.
//!
//! One player hosts: their process runs a relay that forwards every frame
//! to the other player. Both players run the same game loop: read input,
//! apply what the peer sent, step the local combatant and report hits. Each
//! side is authoritative for the hits its own combatant lands.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duelnet::prelude::*;
//!
//! struct Idle;
//!
//! impl Frontend for Idle {
//!     fn poll_input(&mut self) -> InputIntents {
//!         InputIntents::default()
//!     }
//!     fn render(&mut self, _frame: &Frame) {}
//!     fn connection_status(&mut self, status: &str) {
//!         println!("{status}");
//!     }
//! }
//!
//! # async fn demo() -> Result<(), DuelError> {
//! let duel = DuelBuilder::host().port(5000).build().await?;
//! duel.run(&mut Idle).await;
//! # Ok(())
//! # }
//! ```

mod duel;
mod error;
mod frontend;

pub use duel::{DEFAULT_PORT, Duel, DuelBuilder, DuelHandle};
pub use error::DuelError;
pub use frontend::Frontend;

pub use duelnet_match as game;
pub use duelnet_protocol as protocol;
pub use duelnet_relay as relay;
pub use duelnet_session as session;
pub use duelnet_tick as tick;
pub use duelnet_transport as transport;

use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber filtered by `RUST_LOG`, or `info` when
/// it is unset. Does nothing if a global subscriber already exists.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

pub mod prelude {
    pub use crate::{Duel, DuelBuilder, DuelError, DuelHandle, Frontend};
    pub use duelnet_match::{Frame, InputIntents, MatchConfig, MatchEvent, ScoringMode};
    pub use duelnet_protocol::{Message, MessageBody, ParticipantId};
    pub use duelnet_session::SessionState;
}

#[cfg(test)]
mod tests {
    use crate::game::*;
    use crate::relay::*;

    #[test]
    fn test_game_and_relay_exports_do_not_collide() {
        let shared = SharedFrame::from(&b"hit"[..]);
        assert_eq!(&*shared, b"hit");

        let reconciler = Reconciler::new(crate::protocol::ParticipantId::HOST, MatchConfig::default());
        let frame: Frame = reconciler.frame();
        assert_eq!(frame.game_over, None);
    }
}
