//! Message types exchanged with MNS, including core domain identifiers.

use crate::error::ValidationError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated MNS queue name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    pub fn new(name: String) -> Result<Self, ValidationError> {
        if name.is_empty() || name.len() > 256 {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: "must be 1-256 characters".to_string(),
            });
        }

        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "only ASCII letters, digits and hyphens allowed".to_string(),
            });
        }

        if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "must start with a letter".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Identifier assigned to a message by the service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string().to_uppercase())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Opaque per-delivery token required to delete or re-hide a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: String) -> Self {
        Self(handle)
    }

    /// Get handle string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ReceiptHandle {
    fn from(handle: &str) -> Self {
        Self(handle.to_string())
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Create timestamp from Unix epoch milliseconds, as MNS reports times
    pub fn from_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis).single().map(Self)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Unix epoch milliseconds
    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// Request body of a `SendMessage` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub message_body: String,
    pub delay_seconds: Option<u32>,
    pub priority: Option<u32>,
}

impl SendMessageRequest {
    /// Create new request with body
    pub fn new(message_body: impl Into<String>) -> Self {
        Self {
            message_body: message_body.into(),
            delay_seconds: None,
            priority: None,
        }
    }

    /// Apply passthrough send options
    pub fn with_options(mut self, options: &SendOptions) -> Self {
        self.delay_seconds = options.delay_seconds;
        self.priority = options.priority;
        self
    }
}

/// Result of a `SendMessage` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageResponse {
    pub message_id: MessageId,
    pub body_md5: Option<String>,
}

/// A message received from the queue with delivery metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub receipt_handle: ReceiptHandle,
    pub body: String,
    pub body_md5: Option<String>,
    pub dequeue_count: u32,
    pub enqueue_time: Option<Timestamp>,
    pub first_dequeue_time: Option<Timestamp>,
    pub next_visible_time: Option<Timestamp>,
    pub priority: Option<u32>,
}

/// Point-in-time message counts and settings of one queue
///
/// Counts are approximate; the service may report stale values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueAttributes {
    pub queue_name: Option<String>,
    pub active_messages: Option<u64>,
    pub inactive_messages: Option<u64>,
    pub delay_messages: Option<u64>,
    pub visibility_timeout: Option<u32>,
    pub polling_wait_seconds: Option<u32>,
    pub delay_seconds: Option<u32>,
    pub maximum_message_size: Option<u32>,
    pub message_retention_period: Option<u32>,
}

impl QueueAttributes {
    /// Active, inactive and delayed messages, missing counts as zero
    pub fn total_messages(&self) -> u64 {
        self.active_messages
            .unwrap_or(0)
            .saturating_add(self.inactive_messages.unwrap_or(0))
            .saturating_add(self.delay_messages.unwrap_or(0))
    }
}

/// One receipt handle a batch delete could not remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub receipt_handle: ReceiptHandle,
    pub error_code: String,
    pub error_message: String,
}

/// Per-handle result of a `BatchDeleteMessage` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDeleteOutcome {
    pub failures: Vec<DeleteFailure>,
}

impl BatchDeleteOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of a `ChangeMessageVisibility` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityChange {
    /// Handle that replaces the one used for the call
    pub receipt_handle: ReceiptHandle,
    pub next_visible_time: Option<Timestamp>,
}

// ============================================================================
// Send Options
// ============================================================================

/// Passthrough options for `push_raw`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Seconds before the message becomes visible
    pub delay_seconds: Option<u32>,
    /// Message priority, 1 (highest) to 16
    pub priority: Option<u32>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set delivery delay
    pub fn with_delay_seconds(mut self, seconds: u32) -> Self {
        self.delay_seconds = Some(seconds);
        self
    }

    /// Set priority
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
