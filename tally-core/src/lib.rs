//! Tally Core - Entity and Command Types
//!
//! Pure data structures shared by the façade, the consumer, the cache and
//! the store. This crate contains no I/O.

pub mod command;
pub mod error;
pub mod identity;
pub mod transaction;

pub use command::{Command, CommandMessage, Operation, TRANSACTION_QUEUE};
pub use error::{
    BrokerError, CacheError, CommandError, ConfigError, StoreError, TallyError, TallyResult,
};
pub use identity::{new_transaction_id, TransactionId};
pub use transaction::{NewTransaction, Transaction};
