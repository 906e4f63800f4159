//! Client trait for the MNS data-plane and management calls the driver needs.

use crate::error::MnsError;
use crate::message::{
    BatchDeleteOutcome, QueueAttributes, QueueName, ReceiptHandle, ReceivedMessage,
    SendMessageRequest, SendMessageResponse, VisibilityChange,
};
use async_trait::async_trait;

/// Maximum messages one `BatchReceiveMessage` call may return
pub const MAX_BATCH_RECEIVE: u32 = 16;

/// Longest server-side wait MNS allows for a receive call, in seconds
pub const MAX_WAIT_SECONDS: u32 = 30;

/// Capabilities of an MNS client
///
/// Receive calls report an empty queue as an `MnsError::Service` carrying the
/// `MessageNotExist` code; callers decide whether that is a failure.
#[async_trait]
pub trait MnsClient: Send + Sync {
    /// Send one message to a queue
    async fn send_message(
        &self,
        queue: &QueueName,
        request: SendMessageRequest,
    ) -> Result<SendMessageResponse, MnsError>;

    /// Receive one message, optionally long-polling up to `wait_seconds`
    async fn receive_message(
        &self,
        queue: &QueueName,
        wait_seconds: Option<u32>,
    ) -> Result<ReceivedMessage, MnsError>;

    /// Receive up to `num_of_messages` messages
    async fn batch_receive_message(
        &self,
        queue: &QueueName,
        num_of_messages: u32,
        wait_seconds: Option<u32>,
    ) -> Result<Vec<ReceivedMessage>, MnsError>;

    /// Delete several messages; per-handle failures are reported, not raised
    async fn batch_delete_message(
        &self,
        queue: &QueueName,
        receipt_handles: &[ReceiptHandle],
    ) -> Result<BatchDeleteOutcome, MnsError>;

    /// Hide a received message for `visibility_timeout` more seconds
    async fn change_message_visibility(
        &self,
        queue: &QueueName,
        receipt_handle: &ReceiptHandle,
        visibility_timeout: u32,
    ) -> Result<VisibilityChange, MnsError>;

    /// Delete one received message
    async fn delete_message(
        &self,
        queue: &QueueName,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MnsError>;

    /// Fetch queue attributes, including message counts
    async fn get_queue_attributes(&self, queue: &QueueName) -> Result<QueueAttributes, MnsError>;
}
