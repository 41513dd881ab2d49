//! Crewmute Domain - Core game-state types and invariants.
//!
//! Everything in this crate is pure logic: typed identifiers, the closed
//! phase set, roster reconciliation, linked chat users, and the voice rule
//! engine. No I/O, no store access, no randomness - those live behind the
//! engine's ports.

pub mod game;
pub mod ids;
pub mod linked_user;
pub mod phase;
pub mod player;
pub mod session;
pub mod voice;

pub use game::{GameData, RosterChange};
pub use ids::{ChannelId, ConnectCode, GuildId, UserId};
pub use linked_user::LinkedUser;
pub use phase::{GamePhase, UnknownPhase};
pub use player::{PlayerAction, PlayerColor, PlayerUpdate, RosterEntry, UnknownColor};
pub use session::SessionRecord;
pub use voice::{LifePolicy, RulesetKind, TransitionDelays, VoiceRules, VoiceState};
