//! Typed identifier wrappers used throughout the CAE submission core.
//!
//! Every entity that crosses a persistence or REST boundary is addressed by
//! one of these newtypes rather than a bare `String`, so a `DocId` and a
//! `RunId` can never be swapped by accident at a call site.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Error returned when parsing an id-backed identifier fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    message: String,
}

impl IdParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for IdParseError {}

macro_rules! define_uuid_id {
    ($name:ident, $label:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn parse(value: &str) -> Result<Self, IdParseError> {
                Uuid::parse_str(value)
                    .map_err(|e| IdParseError::new(format!("invalid {}: {}", $label, e)))?;
                Ok(Self(value.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

define_uuid_id!(DocId, "doc_id");
define_uuid_id!(RunId, "run_id");
define_uuid_id!(PlanId, "plan_id");
define_uuid_id!(JobId, "job_id");
define_uuid_id!(DecisionPackId, "decision_pack_id");
define_uuid_id!(RecordId, "record_id");

/// Identifiers that are derived content (stable strings picked by catalog
/// authors or computed as hashes) rather than random UUIDs. These are plain
/// `String` newtypes: equality and hashing are all they need.
macro_rules! define_string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_string_id!(TypeId);
define_string_id!(HintId);
define_string_id!(RuleId);
define_string_id!(PlatformKey);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_id_round_trips() {
        let id = DocId::new();
        let parsed = DocId::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn uuid_id_rejects_garbage() {
        assert!(DocId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn string_id_preserves_value() {
        let t = TypeId::from("T104_AUTONOMOS_RECEIPT");
        assert_eq!(t.as_str(), "T104_AUTONOMOS_RECEIPT");
        assert_eq!(t.to_string(), "T104_AUTONOMOS_RECEIPT");
    }
}
