//! The canonical per-match session record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::GameData;
use crate::ids::{ChannelId, ConnectCode, GuildId, UserId};
use crate::linked_user::LinkedUser;

/// Canonical state for one (guild, connect-code) pair.
///
/// Exactly one live record exists per connect code; the engine's session
/// repository keeps it reachable by connect code, voice channel, or text
/// channel. The record itself carries no storage concerns (TTL and pointer
/// keys belong to the repository).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub guild_id: GuildId,
    pub connect_code: ConnectCode,
    pub voice_channel: Option<ChannelId>,
    pub text_channel: Option<ChannelId>,
    pub game: GameData,
    #[serde(default)]
    linked: BTreeMap<UserId, LinkedUser>,
}

impl SessionRecord {
    pub fn new(
        guild_id: GuildId,
        connect_code: ConnectCode,
        text_channel: Option<ChannelId>,
        voice_channel: Option<ChannelId>,
    ) -> Self {
        Self {
            guild_id,
            connect_code,
            voice_channel,
            text_channel,
            game: GameData::new(),
            linked: BTreeMap::new(),
        }
    }

    pub fn linked_users(&self) -> impl Iterator<Item = &LinkedUser> {
        self.linked.values()
    }

    pub fn linked_users_mut(&mut self) -> impl Iterator<Item = &mut LinkedUser> {
        self.linked.values_mut()
    }

    pub fn linked_user(&self, user_id: &UserId) -> Option<&LinkedUser> {
        self.linked.get(user_id)
    }

    pub fn linked_user_mut(&mut self, user_id: &UserId) -> Option<&mut LinkedUser> {
        self.linked.get_mut(user_id)
    }

    /// Insert or replace a linked user, keyed by chat identity.
    pub fn link_user(&mut self, user: LinkedUser) {
        self.linked.insert(user.user_id().clone(), user);
    }

    pub fn unlink_user(&mut self, user_id: &UserId) -> Option<LinkedUser> {
        self.linked.remove(user_id)
    }
}
