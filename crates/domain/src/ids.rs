use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

// Chat-platform identifiers (opaque snowflakes)
define_id!(GuildId);
define_id!(ChannelId);
define_id!(UserId);

// Capture-agent pairing secret
define_id!(ConnectCode);

impl ConnectCode {
    /// Length of a generated connect code.
    pub const LEN: usize = 8;

    /// Characters a generated connect code is drawn from.
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_inner() {
        let guild = GuildId::new("140047693");
        assert_eq!(guild.to_string(), "140047693");
        assert_eq!(guild.as_str(), "140047693");
    }

    #[test]
    fn default_is_empty() {
        assert!(ConnectCode::default().is_empty());
        assert!(!ConnectCode::new("ABCDEFGH").is_empty());
    }

    #[test]
    fn serde_is_transparent() {
        let code = ConnectCode::new("ABCDEFGH");
        let json = serde_json::to_string(&code).expect("serialize");
        assert_eq!(json, "\"ABCDEFGH\"");
        let back: ConnectCode = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, code);
    }
}
