//! Identity types for transaction entities

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Store-assigned transaction identifier.
///
/// The wire format and the store both treat ids as opaque strings. Ids minted
/// by this crate are UUIDv7, so they sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TransactionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for TransactionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generate a new UUIDv7 transaction id (timestamp-sortable).
pub fn new_transaction_id() -> TransactionId {
    TransactionId(Uuid::now_v7().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique_and_non_empty() {
        let a = new_transaction_id();
        let b = new_transaction_id();
        assert!(!a.as_str().is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_serializes_as_plain_string() -> Result<(), serde_json::Error> {
        let id = TransactionId::from("65a1f0c2");
        assert_eq!(serde_json::to_string(&id)?, "\"65a1f0c2\"");
        Ok(())
    }
}
