//! # MNS Queue
//!
//! Queue driver for Alibaba Cloud Message Service (MNS).
//!
//! This library provides:
//! - A queue adapter with `push`, `push_raw`, `later`, `bulk`, `pop`, `size`
//!   and `clear` over one MNS queue
//! - A job wrapper for popped messages with `release` and `delete`
//! - A signed HTTP client for the MNS REST/XML API
//! - An in-memory MNS emulation for tests and local development
//!
//! An empty queue is not an error: the service answers `MessageNotExist`,
//! which `pop` turns into `None` and `clear` treats as the end of the drain.
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Identifiers and the request/response shapes of MNS calls
//! - [`client`] - The `MnsClient` capability trait
//! - [`providers`] - HTTP and in-memory clients
//! - [`payload`] - Job serialization and delay resolution
//! - [`queue`] - The queue adapter
//! - [`job`] - The job wrapper
//! - [`connector`] - Builds adapters from [`ConnectionConfig`]
//! - [`config`] - Connection settings

// Module declarations
pub mod client;
pub mod config;
pub mod connector;
pub mod error;
pub mod job;
pub mod message;
pub mod payload;
pub mod providers;
pub mod queue;

#[cfg(test)]
mod test_support;

// Re-export commonly used types at crate root for convenience
pub use client::{MnsClient, MAX_BATCH_RECEIVE, MAX_WAIT_SECONDS};
pub use config::{ConnectionConfig, HttpOptions};
pub use connector::MnsConnector;
pub use error::{
    ConfigurationError, MnsError, QueueError, SerializationError, ValidationError,
    MESSAGE_NOT_EXIST,
};
pub use job::MnsJob;
pub use message::{
    MessageId, QueueAttributes, QueueName, ReceiptHandle, ReceivedMessage, SendOptions, Timestamp,
};
pub use payload::{
    Clock, Delay, FixedClock, JsonPayloadBuilder, Payload, PayloadBuilder, PendingJob,
    SystemClock,
};
pub use providers::{InMemoryMnsClient, MnsHttpClient};
pub use queue::MnsQueue;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
