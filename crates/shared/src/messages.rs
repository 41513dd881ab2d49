//! Message envelope and typed payloads for the job/event queues.
//!
//! Both lanes carry the same envelope: a message kind plus an opaque JSON
//! payload. The payload type is fixed per kind (see [`MessageKind`]); a
//! payload that fails to decode as the expected shape is a *decode* error,
//! not a protocol error - the queue delivered a well-formed envelope whose
//! contents this consumer cannot use.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crewmute_domain::{GamePhase, PlayerUpdate};

/// Kind of a queued message. Closed set shared by both lanes.
///
/// Expected payloads: `Connection` → [`ConnectionPayload`], `Lobby` →
/// [`LobbyPayload`], `State` → [`StatePayload`], `Player` →
/// [`PlayerUpdate`], `GameOver` → [`GameOverPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Connection,
    Lobby,
    State,
    Player,
    GameOver,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Lobby => write!(f, "lobby"),
            Self::State => write!(f, "state"),
            Self::Player => write!(f, "player"),
            Self::GameOver => write!(f, "game_over"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The envelope itself was malformed (or its payload failed to encode).
    #[error("malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    /// A well-formed envelope whose payload is not the expected shape for
    /// its kind.
    #[error("payload did not decode as the expected shape for '{kind}': {source}")]
    Payload {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },
}

/// The wire envelope carried by both queue lanes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: MessageKind,
    /// JSON text of the kind's payload type, treated as opaque by the
    /// queues themselves.
    pub payload: String,
}

impl Envelope {
    pub fn new<T: Serialize>(kind: MessageKind, payload: &T) -> Result<Self, ProtocolError> {
        Ok(Self {
            kind,
            payload: serde_json::to_string(payload)?,
        })
    }

    pub fn connection(connected: bool) -> Result<Self, ProtocolError> {
        Self::new(MessageKind::Connection, &ConnectionPayload { connected })
    }

    pub fn lobby(room_code: impl Into<String>, region: impl Into<String>) -> Result<Self, ProtocolError> {
        Self::new(
            MessageKind::Lobby,
            &LobbyPayload {
                room_code: room_code.into(),
                region: region.into(),
            },
        )
    }

    pub fn state(phase: GamePhase) -> Result<Self, ProtocolError> {
        Self::new(MessageKind::State, &StatePayload { phase })
    }

    pub fn player(update: &PlayerUpdate) -> Result<Self, ProtocolError> {
        Self::new(MessageKind::Player, update)
    }

    pub fn game_over() -> Result<Self, ProtocolError> {
        Self::new(MessageKind::GameOver, &GameOverPayload { reason: None })
    }

    /// Decode the payload as the type the kind promises.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_str(&self.payload).map_err(|source| ProtocolError::Payload {
            kind: self.kind,
            source,
        })
    }

    pub fn to_wire(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_wire(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Capture agent connected to (or dropped from) the running game client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionPayload {
    pub connected: bool,
}

/// A lobby was detected: its join code and backend region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyPayload {
    pub room_code: String,
    pub region: String,
}

/// The match moved to a new phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    pub phase: GamePhase,
}

/// The match ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GameOverPayload {
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewmute_domain::{PlayerAction, PlayerColor};

    #[test]
    fn envelope_round_trips() {
        let envelope = Envelope::lobby("ABCDEF", "eu-west").expect("encode");
        let raw = envelope.to_wire().expect("wire");
        let back = Envelope::from_wire(&raw).expect("decode");
        assert_eq!(back, envelope);
        let payload: LobbyPayload = back.decode().expect("payload");
        assert_eq!(payload.room_code, "ABCDEF");
    }

    #[test]
    fn player_payload_carries_domain_update() {
        let update = PlayerUpdate {
            color: PlayerColor::Red,
            name: "Red".to_string(),
            dead: false,
            action: PlayerAction::Joined,
            disconnected: false,
        };
        let envelope = Envelope::player(&update).expect("encode");
        assert_eq!(envelope.kind, MessageKind::Player);
        let back: PlayerUpdate = envelope.decode().expect("payload");
        assert_eq!(back, update);
    }

    #[test]
    fn wrong_payload_shape_is_a_decode_error() {
        let envelope = Envelope::connection(true).expect("encode");
        let err = envelope.decode::<LobbyPayload>().expect_err("must fail");
        assert!(matches!(
            err,
            ProtocolError::Payload {
                kind: MessageKind::Connection,
                ..
            }
        ));
    }

    #[test]
    fn unknown_kind_fails_at_the_envelope() {
        let raw = r#"{"kind":"emote","payload":"{}"}"#;
        assert!(matches!(
            Envelope::from_wire(raw),
            Err(ProtocolError::Envelope(_))
        ));
    }

    #[test]
    fn kind_display_matches_wire_names() {
        assert_eq!(MessageKind::GameOver.to_string(), "game_over");
        assert_eq!(
            serde_json::to_string(&MessageKind::GameOver).expect("serialize"),
            "\"game_over\""
        );
    }
}
