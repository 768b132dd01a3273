//! Strongly-typed ID types for flowline entities.
//!
//! IDs wrap a ULID and render with a short type prefix (`wf_01H...`).
//! Parsing accepts either the prefixed form or a bare ULID, so IDs coming
//! from URLs, webhook payloads or logs all round-trip.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when an ID string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// Name of the ID type being parsed.
    pub id_type: &'static str,
    /// Why parsing failed.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

fn parse_prefixed(
    s: &str,
    prefix: &str,
    id_type: &'static str,
) -> Result<Ulid, ParseIdError> {
    let raw = s
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(s);

    Ulid::from_str(raw).map_err(|e| ParseIdError {
        id_type,
        reason: e.to_string(),
    })
}

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Generates a fresh ID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Wraps an existing ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the wrapped ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_prefixed(s, $prefix, stringify!($name)).map(Self)
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }
    };
}

ulid_id!(
    /// Identifies a workflow definition.
    WorkflowId,
    "wf"
);

ulid_id!(
    /// Identifies one trigger-to-terminal run of a workflow against a recipient.
    ExecutionId,
    "exec"
);

ulid_id!(
    /// Identifies a recipient in the external contact directory.
    ContactId,
    "contact"
);

ulid_id!(
    /// Identifies an operator account that conversations can be assigned to.
    UserId,
    "usr"
);

ulid_id!(
    /// Identifies a conversation record owned by the surrounding application.
    ConversationId,
    "conv"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_type_prefix() {
        assert!(WorkflowId::new().to_string().starts_with("wf_"));
        assert!(ExecutionId::new().to_string().starts_with("exec_"));
        assert!(ContactId::new().to_string().starts_with("contact_"));
    }

    #[test]
    fn parses_prefixed_and_bare_forms() {
        let id = ExecutionId::new();
        let prefixed: ExecutionId = id.to_string().parse().expect("prefixed");
        let bare: ExecutionId = id.as_ulid().to_string().parse().expect("bare");
        assert_eq!(prefixed, id);
        assert_eq!(bare, id);
    }

    #[test]
    fn foreign_prefix_is_rejected() {
        let other = WorkflowId::new().to_string();
        let err = other.parse::<ContactId>().unwrap_err();
        assert_eq!(err.id_type, "ContactId");
    }

    #[test]
    fn serializes_as_bare_ulid() {
        let id = ContactId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", id.as_ulid()));
        let parsed: ContactId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, id);
    }
}
