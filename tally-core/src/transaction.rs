//! Transaction entity.

use serde::{Deserialize, Serialize};

use crate::identity::TransactionId;

/// A persisted transaction record.
///
/// Created, mutated and removed only by the command consumer. The façade
/// reads it but never writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub amount: f64,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Transaction {
    /// Overwrite the mutable fields, keeping the id.
    pub fn apply(&mut self, fields: NewTransaction) {
        self.amount = fields.amount;
        self.date = fields.date;
        self.kind = fields.kind;
    }
}

/// Field set for an insert; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: f64,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl NewTransaction {
    pub fn new(amount: f64, date: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            amount,
            date: date.into(),
            kind: kind.into(),
        }
    }

    /// Attach a store-assigned id.
    pub fn with_id(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            amount: self.amount,
            date: self.date,
            kind: self.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_uses_type_on_the_wire() -> Result<(), serde_json::Error> {
        let tx = NewTransaction::new(100.0, "2024-01-01", "debit").with_id("abc".into());
        let json = serde_json::to_value(&tx)?;
        assert_eq!(json["type"], "debit");
        assert_eq!(json["id"], "abc");
        assert!(json.get("kind").is_none());
        Ok(())
    }

    #[test]
    fn test_apply_keeps_id() {
        let mut tx = NewTransaction::new(1.0, "2024-01-01", "debit").with_id("keep".into());
        tx.apply(NewTransaction::new(2.5, "2024-02-02", "credit"));
        assert_eq!(tx.id.as_str(), "keep");
        assert_eq!(tx.amount, 2.5);
        assert_eq!(tx.date, "2024-02-02");
        assert_eq!(tx.kind, "credit");
    }
}
