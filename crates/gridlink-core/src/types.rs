/*!
 * Core data types for GridLink.
 *
 * This module defines the identifiers shared by every GridLink crate.
 */
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for GridLink resources (device identifications,
/// organisation identifications and correlation uids)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// Create a new ID with a random UUID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create an ID from a string
    pub fn from_string<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_string())
    }

    /// Get the string representation of the ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let id = Id::new();
        assert!(!id.as_str().is_empty());

        let id = Id::from_string("RTU-0001");
        assert_eq!(id.as_str(), "RTU-0001");

        let id: Id = "another-id".into();
        assert_eq!(id.as_str(), "another-id");

        let id: Id = String::from("string-id").into();
        assert_eq!(id.as_str(), "string-id");
    }

    #[test]
    fn test_id_display() {
        let id = Id::from_string("RTU-0001");
        assert_eq!(format!("{}", id), "RTU-0001");
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = Id::from_string("RTU-0001");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"RTU-0001\"");

        let back: Id = serde_json::from_str("\"RTU-0002\"").unwrap();
        assert_eq!(back, Id::from("RTU-0002"));
    }
}
