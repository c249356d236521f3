//! Document id namespace
//!
//! Stored documents carry ids of the form `https://openalex.org/W123`, clients
//! only ever see `W123`. `DocId` holds the raw part and adds the namespace on
//! the way into the index.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Namespace carried by every stored document id
pub const DEFAULT_ID_PREFIX: &str = "https://openalex.org/";

/// A document id, independent of whether it arrived namespaced or raw
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(String);

impl DocId {
    /// Accept either form; surrounding whitespace is ignored.
    pub fn parse(id: &str) -> Self {
        let trimmed = id.trim();
        let raw = trimmed.strip_prefix(DEFAULT_ID_PREFIX).unwrap_or(trimmed);
        Self(raw.to_string())
    }

    /// Id as exposed to clients
    pub fn raw(&self) -> &str {
        &self.0
    }

    /// Id as stored in the index
    pub fn namespaced(&self) -> String {
        format!("{}{}", DEFAULT_ID_PREFIX, self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId {
    fn from(value: &str) -> Self {
        DocId::parse(value)
    }
}

impl Serialize for DocId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DocId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(DocId::parse(&value))
    }
}
