//! The voice rule engine: pure lookup from (alive, tracked, phase) to the
//! mute/deafen state a chat user should be in.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::phase::GamePhase;

/// Target server-mute / server-deafen state for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoiceState {
    pub mute: bool,
    pub deafen: bool,
}

/// One rule-table cell pair: what applies to the living and to the dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LifePolicy {
    pub alive: bool,
    pub dead: bool,
}

impl LifePolicy {
    const fn new(alive: bool, dead: bool) -> Self {
        Self { alive, dead }
    }

    fn applies_to(self, is_alive: bool) -> bool {
        if is_alive {
            self.alive
        } else {
            self.dead
        }
    }
}

/// Which preset rule tables a guild runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulesetKind {
    #[default]
    MuteAndDeafen,
    MuteOnly,
}

impl RulesetKind {
    pub fn rules(self) -> VoiceRules {
        match self {
            Self::MuteAndDeafen => VoiceRules::mute_and_deafen(),
            Self::MuteOnly => VoiceRules::mute_only(),
        }
    }
}

/// Two rule tables (mute, deafen), each indexed by phase then by the
/// alive/dead label. Stateless and side-effect-free; callers are expected
/// to apply a [`TransitionDelays`] window before enacting a transition so
/// an ambiguous detection frame does not flap voice state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRules {
    mute: HashMap<GamePhase, LifePolicy>,
    deafen: HashMap<GamePhase, LifePolicy>,
}

impl VoiceRules {
    /// The canonical preset: the living are muted during active play, the
    /// dead are muted and deafened during discussion so votes stay secret.
    pub fn mute_and_deafen() -> Self {
        Self {
            mute: HashMap::from([
                (GamePhase::Menu, LifePolicy::new(false, false)),
                (GamePhase::Lobby, LifePolicy::new(false, false)),
                (GamePhase::Playing, LifePolicy::new(true, false)),
                (GamePhase::Discussion, LifePolicy::new(false, true)),
            ]),
            deafen: HashMap::from([
                (GamePhase::Menu, LifePolicy::new(false, false)),
                (GamePhase::Lobby, LifePolicy::new(false, false)),
                (GamePhase::Playing, LifePolicy::new(false, false)),
                (GamePhase::Discussion, LifePolicy::new(false, true)),
            ]),
        }
    }

    /// Variant for servers where deafening is unwanted: never deafens, and
    /// mutes both the living and the dead during active play.
    pub fn mute_only() -> Self {
        Self {
            mute: HashMap::from([
                (GamePhase::Menu, LifePolicy::new(false, false)),
                (GamePhase::Lobby, LifePolicy::new(false, false)),
                (GamePhase::Playing, LifePolicy::new(true, true)),
                (GamePhase::Discussion, LifePolicy::new(false, true)),
            ]),
            deafen: HashMap::new(),
        }
    }

    /// Decide the target voice state. Untracked users are never touched.
    pub fn decide(&self, is_alive: bool, is_tracked: bool, phase: GamePhase) -> VoiceState {
        if !is_tracked {
            return VoiceState::default();
        }
        VoiceState {
            mute: self
                .mute
                .get(&phase)
                .copied()
                .unwrap_or_default()
                .applies_to(is_alive),
            deafen: self
                .deafen
                .get(&phase)
                .copied()
                .unwrap_or_default()
                .applies_to(is_alive),
        }
    }
}

/// Externally-configured per-transition delays, in milliseconds.
///
/// Phase detection is fuzzy around screen transitions; waiting a beat
/// before enacting a computed change avoids muting someone for a frame of
/// misread state. The delay to apply is looked up by (from, to).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDelays {
    delays: HashMap<GamePhase, HashMap<GamePhase, u64>>,
}

impl Default for TransitionDelays {
    fn default() -> Self {
        let mut delays: HashMap<GamePhase, HashMap<GamePhase, u64>> = HashMap::new();
        // Entering active play is the ambiguous window; discussion popups
        // are unmistakable and act immediately.
        delays
            .entry(GamePhase::Lobby)
            .or_default()
            .insert(GamePhase::Playing, 7_000);
        delays
            .entry(GamePhase::Discussion)
            .or_default()
            .insert(GamePhase::Playing, 7_000);
        for from in GamePhase::ALL {
            delays.entry(from).or_default().insert(GamePhase::Lobby, 1_000);
        }
        Self { delays }
    }
}

impl TransitionDelays {
    pub fn none() -> Self {
        Self {
            delays: HashMap::new(),
        }
    }

    pub fn with_delay(mut self, from: GamePhase, to: GamePhase, millis: u64) -> Self {
        self.delays.entry(from).or_default().insert(to, millis);
        self
    }

    /// Delay to wait before enacting a (from, to) transition's voice
    /// changes. Unlisted transitions act immediately.
    pub fn delay(&self, from: GamePhase, to: GamePhase) -> std::time::Duration {
        let millis = self
            .delays
            .get(&from)
            .and_then(|row| row.get(&to))
            .copied()
            .unwrap_or(0);
        std::time::Duration::from_millis(millis)
    }
}
