//! Wire protocol for duelnet.
//!
//! This crate defines what two duel participants say to each other:
//!
//! - **Types** ([`Message`], [`MessageBody`], [`ParticipantId`], etc.):
//!   the immutable envelope that travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes become
//!   frames and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong with one message.
//!
//! # Architecture
//!
//! The protocol sits between transport (raw frames) and the session
//! (inbound queue). It knows nothing about sockets or combat rules.
//!
//! ```text
//! Transport (frames) → Protocol (Message) → Session (inbound queue) → Reconciler
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{Facing, Message, MessageBody, MessageKind, ParticipantId, Point};
