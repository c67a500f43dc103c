//! Strongly-typed identifiers for cohort entities
//!
//! Upstream identifiers are opaque strings (sometimes numbers on the wire),
//! wrapped in newtype structs for type safety.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
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

string_id!(
    /// Unique identifier for a milestone
    MilestoneId,
    "milestone"
);

string_id!(
    /// Unique identifier for a team
    TeamId,
    "team"
);

string_id!(
    /// Unique identifier for a submission record
    SubmissionId,
    "submission"
);

string_id!(
    /// Unique identifier for a program (cohort)
    ProgramId,
    "program"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_has_prefix() {
        assert_eq!(MilestoneId::new("m1").to_string(), "milestone:m1");
        assert_eq!(TeamId::new("t9").to_string(), "team:t9");
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = SubmissionId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");

        let back: SubmissionId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, id);
    }
}
