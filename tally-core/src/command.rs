//! Commands carried from the façade to the consumer.
//!
//! Two shapes exist: [`CommandMessage`] is the wire payload, where every field
//! is optional and `operation` is a free-form string; [`Command`] is the typed
//! form the consumer dispatches on. Conversion between them is where the
//! id/field invariants are enforced.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommandError;
use crate::identity::TransactionId;
use crate::transaction::NewTransaction;

/// Durable queue the consumer subscribes to.
pub const TRANSACTION_QUEUE: &str = "transaction.queue";

/// Mutation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Operation::Create),
            "UPDATE" => Ok(Operation::Update),
            "DELETE" => Ok(Operation::Delete),
            other => Err(CommandError::UnknownOperation {
                operation: other.to_string(),
            }),
        }
    }
}

/// Broker payload. No schema version field exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    pub operation: String,
}

impl CommandMessage {
    /// Decode a raw broker payload.
    pub fn decode(payload: &[u8]) -> Result<Self, CommandError> {
        serde_json::from_slice(payload).map_err(|e| CommandError::Decode {
            reason: e.to_string(),
        })
    }

    /// Encode for publishing.
    pub fn encode(&self) -> Result<Vec<u8>, CommandError> {
        serde_json::to_vec(self).map_err(|e| CommandError::Encode {
            reason: e.to_string(),
        })
    }

    fn fields(&self, operation: Operation) -> Result<NewTransaction, CommandError> {
        let amount = self.amount.ok_or(CommandError::MissingField {
            operation,
            field: "amount",
        })?;
        let date = self.date.clone().ok_or(CommandError::MissingField {
            operation,
            field: "date",
        })?;
        let kind = self.kind.clone().ok_or(CommandError::MissingField {
            operation,
            field: "type",
        })?;
        Ok(NewTransaction { amount, date, kind })
    }

    fn require_id(&self, operation: Operation) -> Result<TransactionId, CommandError> {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => Ok(TransactionId::new(id)),
            _ => Err(CommandError::MissingField {
                operation,
                field: "id",
            }),
        }
    }
}

/// Typed command.
///
/// CREATE never carries an id; UPDATE and DELETE always do.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create(NewTransaction),
    Update {
        id: TransactionId,
        fields: NewTransaction,
    },
    Delete {
        id: TransactionId,
    },
}

impl Command {
    pub fn operation(&self) -> Operation {
        match self {
            Command::Create(_) => Operation::Create,
            Command::Update { .. } => Operation::Update,
            Command::Delete { .. } => Operation::Delete,
        }
    }

    pub fn id(&self) -> Option<&TransactionId> {
        match self {
            Command::Create(_) => None,
            Command::Update { id, .. } | Command::Delete { id } => Some(id),
        }
    }
}

impl TryFrom<CommandMessage> for Command {
    type Error = CommandError;

    fn try_from(message: CommandMessage) -> Result<Self, Self::Error> {
        let operation: Operation = message.operation.parse()?;
        match operation {
            // An id on CREATE is ignored; the store assigns one.
            Operation::Create => Ok(Command::Create(message.fields(operation)?)),
            Operation::Update => Ok(Command::Update {
                id: message.require_id(operation)?,
                fields: message.fields(operation)?,
            }),
            Operation::Delete => Ok(Command::Delete {
                id: message.require_id(operation)?,
            }),
        }
    }
}

impl From<&Command> for CommandMessage {
    fn from(command: &Command) -> Self {
        let operation = command.operation().as_str().to_string();
        match command {
            Command::Create(fields) => CommandMessage {
                id: None,
                amount: Some(fields.amount),
                date: Some(fields.date.clone()),
                kind: Some(fields.kind.clone()),
                operation,
            },
            Command::Update { id, fields } => CommandMessage {
                id: Some(id.to_string()),
                amount: Some(fields.amount),
                date: Some(fields.date.clone()),
                kind: Some(fields.kind.clone()),
                operation,
            },
            Command::Delete { id } => CommandMessage {
                id: Some(id.to_string()),
                operation,
                ..Default::default()
            },
        }
    }
}
