//! Platform identifiers
//!
//! The messaging platform hands out ids as strings in some payloads and as
//! numbers in others, sometimes padded with whitespace. They are normalized
//! here, once, so the rest of the bot compares ids with plain equality.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Signed(n) => n.to_string(),
            RawId::Unsigned(n) => n.to_string(),
        }
    }
}

macro_rules! platform_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl AsRef<str>) -> Self {
                Self(raw.as_ref().trim().to_string())
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
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self::new(raw)
            }
        }

        impl From<&String> for $name {
            fn from(raw: &String) -> Self {
                Self::new(raw)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self::new(raw.into_string()))
            }
        }
    };
}

platform_id!(
    /// A user on the messaging platform (the bot itself included)
    UserId
);

platform_id!(
    /// A conversation: group chat or direct thread
    ThreadId
);

platform_id!(
    /// A single message within a thread
    MessageId
);

impl UserId {
    /// Reaction echoes sometimes carry no sender, or the literal "0"
    pub fn is_unknown(&self) -> bool {
        self.0.is_empty() || self.0 == "0"
    }
}
