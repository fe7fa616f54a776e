//! Message relay for duelnet.
//!
//! The relay is the meeting point for the two players of a duel. Each
//! player opens one WebSocket connection to it; every frame a player sends
//! is forwarded to every other connected player, unchanged.
//!
//! # Key types
//!
//! - [`Relay`]: binds (with port scanning), accepts players, forwards frames
//! - [`RelayHandle`]: port, client count and shutdown for a spawned relay
//! - [`Registry`] / [`ClientHandle`]: the copy-on-write set of clients
//! - [`RelayConfig`]: host, port, scan range

mod config;
mod error;
mod registry;
mod relay;

pub use config::RelayConfig;
pub use error::RelayError;
pub use registry::{ClientHandle, Registry, SharedFrame};
pub use relay::{Relay, RelayHandle};
