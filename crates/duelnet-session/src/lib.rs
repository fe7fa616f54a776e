//! Client-side connection management for duelnet.
//!
//! A [`Session`] is one player's managed link to the relay:
//!
//! 1. **Connecting**: a single attempt ([`Session::connect`]) or a bounded
//!    retry run ([`Session::connect_with_retry`]).
//! 2. **Sending**: messages are encoded and handed to a writer task, so the
//!    game loop never waits on the network.
//! 3. **Receiving**: a receive task decodes frames into an inbound queue
//!    that the game loop drains once per tick.
//!
//! # How it fits in the stack
//!
//! ```text
//! Game loop driver (above)  ← drains next_message(), calls send_message()
//!     ↕
//! Session (this crate)      ← connection state, retries, queues
//!     ↕
//! Transport + Protocol      ← frames on a WebSocket, JSON Messages
//! ```

mod config;
mod error;
mod session;

pub use config::{ReconnectPolicy, SessionConfig};
pub use error::SessionError;
pub use session::{FailureReason, Session, SessionState};
