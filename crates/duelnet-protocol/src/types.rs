//! Core protocol types for duelnet's wire format.
//!
//! Every frame on the wire is one [`Message`]: who it concerns, when the
//! producer stamped it, and a kind-specific [`MessageBody`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identifies one of the two combatants in a duel.
///
/// Only `1` (the host) and `2` (the guest) are valid. The id is serialized
/// as a bare number, and decoding any other number fails, so code holding a
/// `ParticipantId` never has to re-check the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ParticipantId(u8);

impl ParticipantId {
    /// The hosting participant, combatant 1.
    pub const HOST: Self = Self(1);
    /// The joining participant, combatant 2.
    pub const GUEST: Self = Self(2);
    /// Both participants in id order.
    pub const ALL: [Self; 2] = [Self::HOST, Self::GUEST];

    /// Validates a raw id.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] unless `raw` is 1 or 2.
    pub fn new(raw: u8) -> Result<Self, ProtocolError> {
        match raw {
            1 | 2 => Ok(Self(raw)),
            other => Err(ProtocolError::InvalidMessage(format!(
                "participant id must be 1 or 2, got {other}"
            ))),
        }
    }

    /// The raw id (1 or 2).
    pub fn get(self) -> u8 {
        self.0
    }

    /// The opposing participant.
    pub fn other(self) -> Self {
        if self == Self::HOST { Self::GUEST } else { Self::HOST }
    }

    /// Zero-based slot for per-participant arrays.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u8> for ParticipantId {
    type Error = ProtocolError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<ParticipantId> for u8 {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Payload pieces
// ---------------------------------------------------------------------------

/// A point in arena coordinates (pixels, y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Which way a combatant faces. Decides which side its attack box is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Facing {
    Left,
    #[default]
    Right,
}

// ---------------------------------------------------------------------------
// MessageBody
// ---------------------------------------------------------------------------

/// The kind-specific content of a message.
///
/// `#[serde(tag = "kind", content = "payload")]` produces adjacently tagged
/// JSON, e.g. `{"kind":"Damage","payload":{"amount":1}}`, so a receiver can
/// read the kind before looking at the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum MessageBody {
    /// Where the origin combatant is, and whether it is mid-attack.
    Position {
        x: f64,
        y: f64,
        attacking: bool,
        /// Absent from older peers; receivers then infer facing from motion.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        facing: Option<Facing>,
    },

    /// The origin combatant started an attack, optionally from `at`.
    Attack {
        #[serde(default)]
        at: Option<Point>,
    },

    /// The origin combatant lost `amount` health.
    Damage { amount: u32 },

    /// The sender's view of both hit counts, indexed by
    /// [`ParticipantId::index`].
    StateSync { hits: [u32; 2] },
}

impl MessageBody {
    /// The discriminant, for logging and metrics.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Position { .. } => MessageKind::Position,
            Self::Attack { .. } => MessageKind::Attack,
            Self::Damage { .. } => MessageKind::Damage,
            Self::StateSync { .. } => MessageKind::StateSync,
        }
    }
}

/// Payload-free discriminant of [`MessageBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Position,
    Attack,
    Damage,
    StateSync,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Position => "Position",
            Self::Attack => "Attack",
            Self::Damage => "Damage",
            Self::StateSync => "StateSync",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Message envelope
// ---------------------------------------------------------------------------

/// The unit of wire transfer.
///
/// ```text
/// ┌───────────────────────────────────┐
/// │ origin: 1                         │  ← combatant the message concerns
/// │ sent_at: 1532                     │  ← producer clock, ms (diagnostic)
/// │ ┌───────────────────────────────┐ │
/// │ │ body: Damage { amount: 1 }    │ │
/// │ └───────────────────────────────┘ │
/// └───────────────────────────────────┘
/// ```
///
/// Fields are private and there is no mutating API: once built, a message
/// is never changed on its way from producer to consumer.
///
/// For `Position`, `Attack` and `StateSync` the origin is the sender's own
/// combatant. For `Damage` it is the combatant taking the damage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    origin: ParticipantId,
    sent_at: u64,
    body: MessageBody,
}

impl Message {
    /// Builds a message. `sent_at` is the producer's monotonic clock in ms.
    pub fn new(origin: ParticipantId, sent_at: u64, body: MessageBody) -> Self {
        Self { origin, sent_at, body }
    }

    pub fn origin(&self) -> ParticipantId {
        self.origin
    }

    pub fn sent_at(&self) -> u64 {
        self.sent_at
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }

    /// Checks rules the type system can't: coordinates must be finite.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] naming the offending field.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let coords = match &self.body {
            MessageBody::Position { x, y, .. } => Some((*x, *y)),
            MessageBody::Attack { at: Some(p) } => Some((p.x, p.y)),
            MessageBody::Attack { at: None }
            | MessageBody::Damage { .. }
            | MessageBody::StateSync { .. } => None,
        };
        match coords {
            Some((x, y)) if !x.is_finite() || !y.is_finite() => {
                Err(ProtocolError::InvalidMessage(format!(
                    "{} from {} has non-finite coordinates",
                    self.kind(),
                    self.origin
                )))
            }
            _ => Ok(()),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The JSON shape is what a peer built from another revision reads, so
    //! these tests pin it down.

    use super::*;

    #[test]
    fn test_participant_id_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&ParticipantId::GUEST).unwrap(), "2");
    }

    #[test]
    fn test_participant_id_rejects_out_of_range() {
        assert!(serde_json::from_str::<ParticipantId>("0").is_err());
        assert!(serde_json::from_str::<ParticipantId>("3").is_err());
        assert!(ParticipantId::new(7).is_err());
        assert_eq!(serde_json::from_str::<ParticipantId>("1").unwrap(), ParticipantId::HOST);
    }

    #[test]
    fn test_participant_id_other_and_index() {
        assert_eq!(ParticipantId::HOST.other(), ParticipantId::GUEST);
        assert_eq!(ParticipantId::GUEST.other(), ParticipantId::HOST);
        assert_eq!(ParticipantId::HOST.index(), 0);
        assert_eq!(ParticipantId::GUEST.index(), 1);
        assert_eq!(ParticipantId::GUEST.to_string(), "P2");
    }

    #[test]
    fn test_position_json_format() {
        let msg = Message::new(
            ParticipantId::HOST,
            40,
            MessageBody::Position { x: 200.0, y: 400.0, attacking: true, facing: None },
        );
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["origin"], 1);
        assert_eq!(json["sent_at"], 40);
        assert_eq!(json["body"]["kind"], "Position");
        assert_eq!(json["body"]["payload"]["x"], 200.0);
        assert_eq!(json["body"]["payload"]["attacking"], true);
        // Absent facing is omitted rather than sent as null.
        assert!(json["body"]["payload"].get("facing").is_none());
    }

    #[test]
    fn test_position_without_facing_decodes() {
        let json = r#"{"origin":2,"sent_at":5,
            "body":{"kind":"Position","payload":{"x":1.5,"y":2.0,"attacking":false}}}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg.body(),
            &MessageBody::Position { x: 1.5, y: 2.0, attacking: false, facing: None }
        );
    }

    #[test]
    fn test_state_sync_json_format() {
        let msg = Message::new(ParticipantId::GUEST, 0, MessageBody::StateSync { hits: [3, 4] });
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["body"]["kind"], "StateSync");
        assert_eq!(json["body"]["payload"]["hits"], serde_json::json!([3, 4]));
    }

    #[test]
    fn test_attack_without_position_decodes() {
        let json = r#"{"origin":1,"sent_at":9,"body":{"kind":"Attack","payload":{}}}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.body(), &MessageBody::Attack { at: None });
        assert_eq!(msg.kind(), MessageKind::Attack);
    }

    #[test]
    fn test_facing_serializes_as_pascal_case() {
        assert_eq!(serde_json::to_string(&Facing::Left).unwrap(), "\"Left\"");
        assert_eq!(Facing::default(), Facing::Right);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let json = r#"{"origin":1,"sent_at":0,"body":{"kind":"Teleport","payload":{}}}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn test_bad_origin_is_rejected() {
        let json = r#"{"origin":9,"sent_at":0,"body":{"kind":"Damage","payload":{"amount":1}}}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_coordinates() {
        let msg = Message::new(
            ParticipantId::HOST,
            0,
            MessageBody::Attack { at: Some(Point::new(f64::INFINITY, 0.0)) },
        );
        assert!(matches!(msg.validate(), Err(ProtocolError::InvalidMessage(_))));

        let ok = Message::new(ParticipantId::HOST, 0, MessageBody::Damage { amount: 1 });
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(MessageKind::StateSync.to_string(), "StateSync");
    }
}
