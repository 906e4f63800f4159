//! In-memory MNS emulation for testing and development.
//!
//! This module provides an in-process stand-in for an MNS account that:
//! - Honors delivery delays and visibility timeouts
//! - Issues a fresh receipt handle on every delivery and visibility change
//! - Tracks dequeue counts and reports active/inactive/delayed counts
//! - Answers an empty receive with `MessageNotExist`, like the service
//!
//! Receives never block: `wait_seconds` is accepted and ignored.

use crate::client::MnsClient;
use crate::error::{MnsError, MESSAGE_NOT_EXIST};
use crate::message::{
    BatchDeleteOutcome, DeleteFailure, MessageId, QueueAttributes, QueueName, ReceiptHandle,
    ReceivedMessage, SendMessageRequest, SendMessageResponse, Timestamp, VisibilityChange,
};
use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Configuration for the in-memory client
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    /// How long a received message stays hidden
    pub visibility_timeout: Duration,
    /// Create queues on first use instead of answering `QueueNotExist`
    pub auto_create_queues: bool,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::seconds(30),
            auto_create_queues: true,
        }
    }
}

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Storage for all queues
struct QueueStorage {
    queues: HashMap<QueueName, Vec<StoredMessage>>,
    config: InMemoryConfig,
}

impl QueueStorage {
    fn new(config: InMemoryConfig) -> Self {
        Self {
            queues: HashMap::new(),
            config,
        }
    }

    /// Get a queue, creating it when allowed
    fn queue_mut(&mut self, queue: &QueueName) -> Result<&mut Vec<StoredMessage>, MnsError> {
        if self.config.auto_create_queues {
            return Ok(self.queues.entry(queue.clone()).or_default());
        }

        self.queues
            .get_mut(queue)
            .ok_or_else(|| queue_not_exist(queue))
    }

    /// Hand out up to `limit` visible messages
    fn deliver(
        &mut self,
        queue: &QueueName,
        limit: usize,
    ) -> Result<Vec<ReceivedMessage>, MnsError> {
        let visibility_timeout = self.config.visibility_timeout;
        let messages = self.queue_mut(queue)?;
        let now = Timestamp::now();

        let delivered: Vec<ReceivedMessage> = messages
            .iter_mut()
            .filter(|message| message.visible_at <= now)
            .take(limit)
            .map(|message| message.deliver(&now, visibility_timeout))
            .collect();

        if delivered.is_empty() {
            return Err(MnsError::message_not_exist("Message not exist."));
        }

        Ok(delivered)
    }
}

/// A message stored in the queue with delivery state
struct StoredMessage {
    message_id: MessageId,
    body: String,
    priority: Option<u32>,
    enqueue_time: Timestamp,
    first_dequeue_time: Option<Timestamp>,
    visible_at: Timestamp,
    dequeue_count: u32,
    receipt_handle: Option<ReceiptHandle>,
}

impl StoredMessage {
    fn from_request(request: SendMessageRequest) -> Self {
        let now = Timestamp::now();
        let delay = Duration::seconds(i64::from(request.delay_seconds.unwrap_or(0)));

        Self {
            message_id: MessageId::generate(),
            body: request.message_body,
            priority: request.priority,
            enqueue_time: now.clone(),
            first_dequeue_time: None,
            visible_at: Timestamp::from_datetime(now.as_datetime() + delay),
            dequeue_count: 0,
            receipt_handle: None,
        }
    }

    fn deliver(&mut self, now: &Timestamp, visibility_timeout: Duration) -> ReceivedMessage {
        self.dequeue_count += 1;
        self.first_dequeue_time.get_or_insert_with(|| now.clone());
        self.visible_at = Timestamp::from_datetime(now.as_datetime() + visibility_timeout);
        let receipt_handle = new_receipt_handle();
        self.receipt_handle = Some(receipt_handle.clone());

        ReceivedMessage {
            message_id: self.message_id.clone(),
            receipt_handle,
            body: self.body.clone(),
            body_md5: None,
            dequeue_count: self.dequeue_count,
            enqueue_time: Some(self.enqueue_time.clone()),
            first_dequeue_time: self.first_dequeue_time.clone(),
            next_visible_time: Some(self.visible_at.clone()),
            priority: self.priority,
        }
    }

    /// The handle is only valid while this delivery is still hidden
    fn holds(&self, handle: &ReceiptHandle, now: &Timestamp) -> bool {
        self.receipt_handle.as_ref() == Some(handle) && self.visible_at > *now
    }
}

fn new_receipt_handle() -> ReceiptHandle {
    ReceiptHandle::new(format!("1-{}", uuid::Uuid::new_v4().simple()))
}

fn queue_not_exist(queue: &QueueName) -> MnsError {
    MnsError::service(
        404,
        "QueueNotExist",
        format!("The queue name you provided is not exist: {}", queue),
    )
}

fn handle_not_exist(handle: &ReceiptHandle) -> MnsError {
    MnsError::service(
        404,
        MESSAGE_NOT_EXIST,
        format!("The message you provided is not exist: {}", handle),
    )
}

// ============================================================================
// InMemoryMnsClient
// ============================================================================

/// In-memory MNS client
///
/// Clones share the same storage, so a test can keep a handle while the
/// queue adapter owns another.
#[derive(Clone)]
pub struct InMemoryMnsClient {
    storage: Arc<RwLock<QueueStorage>>,
}

impl InMemoryMnsClient {
    /// Create new in-memory client with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            storage: Arc::new(RwLock::new(QueueStorage::new(config))),
        }
    }

    /// Create a queue explicitly; a no-op if it exists
    pub fn create_queue(&self, queue: &QueueName) -> Result<(), MnsError> {
        self.storage()?.queues.entry(queue.clone()).or_default();
        Ok(())
    }

    fn storage(&self) -> Result<RwLockWriteGuard<'_, QueueStorage>, MnsError> {
        self.storage
            .write()
            .map_err(|_| MnsError::service(500, "InternalError", "queue storage lock poisoned"))
    }
}

impl Default for InMemoryMnsClient {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

#[async_trait]
impl MnsClient for InMemoryMnsClient {
    async fn send_message(
        &self,
        queue: &QueueName,
        request: SendMessageRequest,
    ) -> Result<SendMessageResponse, MnsError> {
        let mut storage = self.storage()?;
        let message = StoredMessage::from_request(request);
        let message_id = message.message_id.clone();
        storage.queue_mut(queue)?.push(message);

        Ok(SendMessageResponse {
            message_id,
            body_md5: None,
        })
    }

    async fn receive_message(
        &self,
        queue: &QueueName,
        _wait_seconds: Option<u32>,
    ) -> Result<ReceivedMessage, MnsError> {
        let mut delivered = self.storage()?.deliver(queue, 1)?;
        delivered
            .pop()
            .ok_or_else(|| MnsError::message_not_exist("Message not exist."))
    }

    async fn batch_receive_message(
        &self,
        queue: &QueueName,
        num_of_messages: u32,
        _wait_seconds: Option<u32>,
    ) -> Result<Vec<ReceivedMessage>, MnsError> {
        let limit = usize::try_from(num_of_messages).unwrap_or(usize::MAX);
        self.storage()?.deliver(queue, limit)
    }

    async fn batch_delete_message(
        &self,
        queue: &QueueName,
        receipt_handles: &[ReceiptHandle],
    ) -> Result<BatchDeleteOutcome, MnsError> {
        let mut storage = self.storage()?;
        let messages = storage.queue_mut(queue)?;
        let now = Timestamp::now();
        let mut outcome = BatchDeleteOutcome::default();

        for handle in receipt_handles {
            match messages.iter().position(|m| m.holds(handle, &now)) {
                Some(index) => {
                    messages.remove(index);
                }
                None => outcome.failures.push(DeleteFailure {
                    receipt_handle: handle.clone(),
                    error_code: MESSAGE_NOT_EXIST.to_string(),
                    error_message: "The message you provided is not exist.".to_string(),
                }),
            }
        }

        Ok(outcome)
    }

    async fn change_message_visibility(
        &self,
        queue: &QueueName,
        receipt_handle: &ReceiptHandle,
        visibility_timeout: u32,
    ) -> Result<VisibilityChange, MnsError> {
        let mut storage = self.storage()?;
        let messages = storage.queue_mut(queue)?;
        let now = Timestamp::now();

        let message = messages
            .iter_mut()
            .find(|m| m.holds(receipt_handle, &now))
            .ok_or_else(|| handle_not_exist(receipt_handle))?;

        let new_handle = new_receipt_handle();
        message.receipt_handle = Some(new_handle.clone());
        message.visible_at = Timestamp::from_datetime(
            now.as_datetime() + Duration::seconds(i64::from(visibility_timeout)),
        );

        Ok(VisibilityChange {
            receipt_handle: new_handle,
            next_visible_time: Some(message.visible_at.clone()),
        })
    }

    async fn delete_message(
        &self,
        queue: &QueueName,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MnsError> {
        let mut storage = self.storage()?;
        let messages = storage.queue_mut(queue)?;
        let now = Timestamp::now();

        let index = messages
            .iter()
            .position(|m| m.holds(receipt_handle, &now))
            .ok_or_else(|| handle_not_exist(receipt_handle))?;
        messages.remove(index);
        Ok(())
    }

    async fn get_queue_attributes(&self, queue: &QueueName) -> Result<QueueAttributes, MnsError> {
        let mut storage = self.storage()?;
        let visibility_timeout = storage.config.visibility_timeout.num_seconds();
        let messages = storage.queue_mut(queue)?;
        let now = Timestamp::now();

        let mut attributes = QueueAttributes {
            queue_name: Some(queue.to_string()),
            active_messages: Some(0),
            inactive_messages: Some(0),
            delay_messages: Some(0),
            visibility_timeout: u32::try_from(visibility_timeout).ok(),
            ..Default::default()
        };

        for message in messages.iter() {
            let counter = if message.visible_at <= now {
                &mut attributes.active_messages
            } else if message.dequeue_count > 0 {
                &mut attributes.inactive_messages
            } else {
                &mut attributes.delay_messages
            };
            *counter = counter.map(|count| count + 1);
        }

        Ok(attributes)
    }
}
