//! Tally Events - Command Broker and Consumer
//!
//! The façade publishes encoded [`CommandMessage`](tally_core::CommandMessage)
//! payloads through a [`CommandPublisher`]; a single [`CommandConsumer`]
//! reads them from a [`CommandSource`] and applies them to the entity store,
//! one message at a time.

pub mod broker;
pub mod consumer;

pub use broker::{CommandPublisher, CommandSource, InMemoryBroker, InMemoryPublisher, InMemorySubscription};
pub use consumer::{
    ApplyFailure, ApplyOutcome, CommandConsumer, ConsumerMetrics, ConsumerSnapshot, FailureSink,
    LogFailureSink, SkipReason,
};
