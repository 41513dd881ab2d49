//! Embedded match state and the reconciliation of incoming player updates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::phase::GamePhase;
use crate::player::{PlayerAction, PlayerUpdate, RosterEntry};

/// Outcome of reconciling one [`PlayerUpdate`] into the roster.
///
/// Carries enough detail for the caller to decide whether a voice-state
/// recomputation is warranted; recomputing on every unchanged update would
/// be wasted work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterChange {
    /// The stored entry already matched the update.
    Unchanged,
    /// A previously-unseen name was inserted. Not an aliveness-only change.
    Inserted,
    /// The stored entry was overwritten.
    Updated { aliveness_changed: bool },
}

impl RosterChange {
    pub fn needs_voice_refresh(self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    pub fn aliveness_changed(self) -> bool {
        matches!(
            self,
            Self::Updated {
                aliveness_changed: true
            }
        )
    }
}

/// Match state embedded in a session record: phase, room code, region, and
/// the roster keyed by in-game player name (not chat-platform identity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameData {
    phase: GamePhase,
    room_code: Option<String>,
    region: Option<String>,
    roster: BTreeMap<String, RosterEntry>,
}

impl Default for GameData {
    fn default() -> Self {
        Self {
            phase: GamePhase::Menu,
            room_code: None,
            region: None,
            roster: BTreeMap::new(),
        }
    }
}

impl GameData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn room_code(&self) -> Option<&str> {
        self.room_code.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn roster(&self) -> &BTreeMap<String, RosterEntry> {
        &self.roster
    }

    pub fn roster_entry(&self, name: &str) -> Option<&RosterEntry> {
        self.roster.get(name)
    }

    /// Record the lobby the capture agent joined.
    pub fn set_lobby(&mut self, room_code: impl Into<String>, region: impl Into<String>) {
        self.room_code = Some(room_code.into());
        self.region = Some(region.into());
    }

    /// Apply a phase transition and its side effects.
    ///
    /// Entering [`GamePhase::Lobby`], or moving from lobby into active play,
    /// marks every roster entry alive. Entering [`GamePhase::Menu`] clears
    /// room code and region but leaves the roster intact. Returns whether
    /// the phase actually changed.
    pub fn transition(&mut self, to: GamePhase) -> bool {
        let changed = self.phase != to;
        match to {
            GamePhase::Lobby => self.revive_all(),
            GamePhase::Playing if self.phase == GamePhase::Lobby => self.revive_all(),
            GamePhase::Menu if changed => {
                self.room_code = None;
                self.region = None;
            }
            _ => {}
        }
        self.phase = to;
        changed
    }

    /// Drop every roster entry.
    pub fn clear_roster(&mut self) {
        self.roster.clear();
    }

    /// Reconcile one incoming player update into the roster.
    ///
    /// Liveness overrides, in order: a lobby-like phase forces the update
    /// alive (no eliminations are possible before play starts), then an
    /// exile action forces it dead regardless of the reported flag.
    pub fn apply_player_update(&mut self, update: &PlayerUpdate) -> RosterChange {
        let mut dead = update.dead;
        if self.phase.is_lobby_like() {
            dead = false;
        }
        if update.action == PlayerAction::Exiled {
            dead = true;
        }
        let alive = !dead;

        if let Some(entry) = self.roster.get_mut(&update.name) {
            if entry.color == update.color && entry.name == update.name && entry.alive == alive {
                return RosterChange::Unchanged;
            }
            let aliveness_changed = entry.alive != alive;
            entry.color = update.color;
            entry.name = update.name.clone();
            entry.alive = alive;
            return RosterChange::Updated { aliveness_changed };
        }

        self.roster.insert(
            update.name.clone(),
            RosterEntry {
                color: update.color,
                name: update.name.clone(),
                alive,
            },
        );
        RosterChange::Inserted
    }

    fn revive_all(&mut self) {
        for entry in self.roster.values_mut() {
            entry.alive = true;
        }
    }
}
