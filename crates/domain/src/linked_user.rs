//! Chat-identity to in-game-roster correlation.

use serde::{Deserialize, Serialize};

use crate::game::GameData;
use crate::ids::UserId;
use crate::player::RosterEntry;

/// A chat-platform user correlated with (at most) one roster entry.
///
/// The roster association is a name lookup, never a pointer: the roster is
/// cleared and replaced on phase transitions, and a [`LinkedUser`] must not
/// dangle when that happens. `roster_entry` simply resolves against the
/// current roster and returns nothing once the entry is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedUser {
    user_id: UserId,
    nickname: String,
    original_nickname: String,
    in_game_name: Option<String>,
    pending_voice_update: bool,
}

impl LinkedUser {
    pub fn new(user_id: UserId, nickname: impl Into<String>) -> Self {
        let nickname = nickname.into();
        Self {
            user_id,
            original_nickname: nickname.clone(),
            nickname,
            in_game_name: None,
            pending_voice_update: false,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn original_nickname(&self) -> &str {
        &self.original_nickname
    }

    pub fn in_game_name(&self) -> Option<&str> {
        self.in_game_name.as_deref()
    }

    /// True when this user is correlated with an in-game player and should
    /// be tracked by the voice rule engine.
    pub fn is_tracked(&self) -> bool {
        self.in_game_name.is_some()
    }

    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.nickname = nickname.into();
    }

    pub fn link(&mut self, in_game_name: impl Into<String>) {
        self.in_game_name = Some(in_game_name.into());
    }

    pub fn unlink(&mut self) {
        self.in_game_name = None;
    }

    pub fn voice_pending(&self) -> bool {
        self.pending_voice_update
    }

    pub fn set_voice_pending(&mut self, pending: bool) {
        self.pending_voice_update = pending;
    }

    /// Resolve the associated roster entry in the given match state.
    pub fn roster_entry<'a>(&self, game: &'a GameData) -> Option<&'a RosterEntry> {
        self.in_game_name
            .as_deref()
            .and_then(|name| game.roster_entry(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::GamePhase;
    use crate::player::{PlayerAction, PlayerColor, PlayerUpdate};

    #[test]
    fn roster_lookup_survives_roster_clear() {
        let mut game = GameData::new();
        game.transition(GamePhase::Lobby);
        game.apply_player_update(&PlayerUpdate {
            color: PlayerColor::Red,
            name: "Red".to_string(),
            dead: false,
            action: PlayerAction::Joined,
            disconnected: false,
        });

        let mut user = LinkedUser::new(UserId::new("1001"), "red_main");
        user.link("Red");
        assert!(user.is_tracked());
        assert!(user.roster_entry(&game).is_some());

        game.clear_roster();
        // the association is a lookup, so the cleared roster just resolves to nothing
        assert!(user.roster_entry(&game).is_none());
        assert!(user.is_tracked());
    }

    #[test]
    fn unlink_clears_tracking() {
        let mut user = LinkedUser::new(UserId::new("1001"), "red_main");
        user.link("Red");
        user.unlink();
        assert!(!user.is_tracked());
        assert_eq!(user.in_game_name(), None);
    }

    #[test]
    fn original_nickname_is_preserved() {
        let mut user = LinkedUser::new(UserId::new("1001"), "red_main");
        user.set_nickname("Red | playing");
        assert_eq!(user.nickname(), "Red | playing");
        assert_eq!(user.original_nickname(), "red_main");
    }
}
