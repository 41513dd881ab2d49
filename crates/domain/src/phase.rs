//! The closed set of match phases.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Phase of a tracked match.
///
/// The set is closed: capture agents report one of these four values, and
/// every voice rule table is indexed by them. Game-over is an event, not a
/// phase - after a match ends the capture agent reports `Menu` or `Lobby`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Not in a lobby or match at all.
    Menu,
    /// In a pre-game lobby; the match has not started.
    Lobby,
    /// Active play (task work, free movement).
    Playing,
    /// A discussion/vote is underway.
    Discussion,
}

/// A numeric phase index outside the closed set.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown phase index {0}")]
pub struct UnknownPhase(pub u8);

impl GamePhase {
    /// All phases, in wire-index order.
    pub const ALL: [GamePhase; 4] = [Self::Menu, Self::Lobby, Self::Playing, Self::Discussion];

    /// True when no eliminations are possible (no match is running).
    pub fn is_lobby_like(self) -> bool {
        matches!(self, Self::Menu | Self::Lobby)
    }

    /// Stable wire index.
    pub fn index(self) -> u8 {
        match self {
            Self::Menu => 0,
            Self::Lobby => 1,
            Self::Playing => 2,
            Self::Discussion => 3,
        }
    }
}

impl TryFrom<u8> for GamePhase {
    type Error = UnknownPhase;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Menu),
            1 => Ok(Self::Lobby),
            2 => Ok(Self::Playing),
            3 => Ok(Self::Discussion),
            other => Err(UnknownPhase(other)),
        }
    }
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Menu => write!(f, "menu"),
            Self::Lobby => write!(f, "lobby"),
            Self::Playing => write!(f, "playing"),
            Self::Discussion => write!(f, "discussion"),
        }
    }
}
