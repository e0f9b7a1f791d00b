//! Store-assigned record identifiers.

use std::fmt;
use std::str::FromStr;

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Raised when a string cannot be turned into a [`RecordId`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("'{input}' is not a valid record identifier")]
pub struct IdError {
    pub input: String,
}

/// Opaque identifier assigned by the store when a document is inserted.
///
/// The textual form is the only representation that crosses the HTTP
/// boundary; parse it back with [`str::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(ObjectId);

impl RecordId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(ObjectId::new())
    }

    pub(crate) fn object_id(&self) -> ObjectId {
        self.0
    }
}

impl From<ObjectId> for RecordId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl FromStr for RecordId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s).map(Self).map_err(|_| IdError {
            input: s.to_string(),
        })
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_then_parse_yields_same_id() {
        let id = RecordId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), 24);
        assert_eq!(text.parse::<RecordId>().unwrap(), id);
    }

    #[test]
    fn malformed_input_is_rejected() {
        for input in ["", "not-an-id", "65f0c0ffee", "zzzzzzzzzzzzzzzzzzzzzzzz"] {
            let err = input.parse::<RecordId>().unwrap_err();
            assert_eq!(err.input, input);
        }
    }

    #[test]
    fn serde_uses_the_string_form() {
        let id: RecordId = "65f0c0ffee65f0c0ffee65f0".parse().unwrap();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::json!("65f0c0ffee65f0c0ffee65f0"));

        let back: RecordId = serde_json::from_value(json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_value::<RecordId>(serde_json::json!("nope")).is_err());
    }
}
