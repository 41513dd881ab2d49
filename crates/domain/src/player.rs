//! Players as the capture agent sees them: colors, roster snapshots, and
//! the transient updates reconciled into a session's roster.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// In-game player color with a stable integer mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Pink,
    Orange,
    Yellow,
    Black,
    White,
    Purple,
    Brown,
    Cyan,
    Lime,
}

/// A color index outside the stable mapping.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown color index {0}")]
pub struct UnknownColor(pub u8);

impl PlayerColor {
    pub const ALL: [PlayerColor; 12] = [
        Self::Red,
        Self::Blue,
        Self::Green,
        Self::Pink,
        Self::Orange,
        Self::Yellow,
        Self::Black,
        Self::White,
        Self::Purple,
        Self::Brown,
        Self::Cyan,
        Self::Lime,
    ];

    /// Stable wire index. The mapping is a cross-process contract with the
    /// capture agent and must never be reordered.
    pub fn index(self) -> u8 {
        match self {
            Self::Red => 0,
            Self::Blue => 1,
            Self::Green => 2,
            Self::Pink => 3,
            Self::Orange => 4,
            Self::Yellow => 5,
            Self::Black => 6,
            Self::White => 7,
            Self::Purple => 8,
            Self::Brown => 9,
            Self::Cyan => 10,
            Self::Lime => 11,
        }
    }
}

impl TryFrom<u8> for PlayerColor {
    type Error = UnknownColor;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(UnknownColor(value))
    }
}

impl std::fmt::Display for PlayerColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Pink => "pink",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Black => "black",
            Self::White => "white",
            Self::Purple => "purple",
            Self::Brown => "brown",
            Self::Cyan => "cyan",
            Self::Lime => "lime",
        };
        write!(f, "{name}")
    }
}

/// What happened to a player, as tagged by the capture agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerAction {
    Joined,
    Left,
    Died,
    ColorChanged,
    Disconnected,
    Exiled,
}

/// One player's snapshot inside a session's roster, keyed by in-game name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub color: PlayerColor,
    pub name: String,
    pub alive: bool,
}

/// A transient player update from the capture agent.
///
/// Never persisted as-is - only its reconciled effect on a [`RosterEntry`]
/// survives (see [`crate::GameData::apply_player_update`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    pub color: PlayerColor,
    pub name: String,
    pub dead: bool,
    pub action: PlayerAction,
    #[serde(default)]
    pub disconnected: bool,
}
