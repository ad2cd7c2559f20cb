use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Ids are opaque strings on disk, so both wrappers share one serde-transparent shape.
macro_rules! define_storage_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_storage_id!(SessionId);
define_storage_id!(MessageId);

impl SessionId {
    /// Mints a fresh time-ordered session id (`session_<uuid v7>`).
    pub fn generate() -> Self {
        Self(format!("session_{}", Uuid::now_v7().simple()))
    }
}

pub const MESSAGE_ID_PREFIX: &str = "m";

impl MessageId {
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("{MESSAGE_ID_PREFIX}{sequence}"))
    }

    /// Returns `n` for ids shaped like `m<n>`.
    pub fn sequence(&self) -> Option<u64> {
        self.0
            .strip_prefix(MESSAGE_ID_PREFIX)
            .and_then(|digits| digits.parse::<u64>().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_session_ids_are_distinct() {
        let first = SessionId::generate();
        let second = SessionId::generate();
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("session_"));
    }

    #[test]
    fn message_sequence_only_parses_counter_ids() {
        assert_eq!(MessageId::from_sequence(12).sequence(), Some(12));
        assert_eq!(MessageId::new("welcome").sequence(), None);
        assert_eq!(MessageId::new("m").sequence(), None);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let encoded = serde_json::to_string(&MessageId::from_sequence(3)).unwrap();
        assert_eq!(encoded, "\"m3\"");
    }
}
