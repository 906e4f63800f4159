//! A job popped from an MNS queue.

use crate::client::MnsClient;
use crate::error::{QueueError, SerializationError};
use crate::message::{MessageId, QueueName, ReceiptHandle, ReceivedMessage};
use crate::payload::Payload;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;

/// One dequeued message plus the means to acknowledge or re-queue it
///
/// Local state only changes after the service accepted the call; a failed
/// `release` or `delete` leaves the job exactly as it was.
pub struct MnsJob {
    client: Arc<dyn MnsClient>,
    message: ReceivedMessage,
    connection_name: String,
    queue: QueueName,
    released: bool,
    deleted: bool,
}

impl MnsJob {
    pub fn new(
        client: Arc<dyn MnsClient>,
        message: ReceivedMessage,
        connection_name: impl Into<String>,
        queue: QueueName,
    ) -> Self {
        Self {
            client,
            message,
            connection_name: connection_name.into(),
            queue,
            released: false,
            deleted: false,
        }
    }

    /// Make the message visible again after `delay_seconds`
    ///
    /// The service issues a new receipt handle, which replaces the held one.
    pub async fn release(&mut self, delay_seconds: u32) -> Result<(), QueueError> {
        let change = self
            .client
            .change_message_visibility(&self.queue, &self.message.receipt_handle, delay_seconds)
            .await?;

        debug!(
            queue = %self.queue,
            message_id = %self.message.message_id,
            delay_seconds,
            "Job released"
        );

        self.message.receipt_handle = change.receipt_handle;
        if change.next_visible_time.is_some() {
            self.message.next_visible_time = change.next_visible_time;
        }
        self.released = true;
        Ok(())
    }

    /// Remove the message from the queue
    pub async fn delete(&mut self) -> Result<(), QueueError> {
        self.client
            .delete_message(&self.queue, &self.message.receipt_handle)
            .await?;

        info!(
            queue = %self.queue,
            message_id = %self.message.message_id,
            "Job deleted"
        );

        self.deleted = true;
        Ok(())
    }

    /// Number of times the message has been received
    pub fn attempts(&self) -> u32 {
        self.message.dequeue_count
    }

    pub fn job_id(&self) -> &MessageId {
        &self.message.message_id
    }

    pub fn raw_body(&self) -> &str {
        &self.message.body
    }

    /// Decode the body as a `{"job": ..., "data": ...}` payload
    pub fn payload(&self) -> Result<Payload, SerializationError> {
        Payload::from_body(&self.message.body)
    }

    /// Job name from the payload, if the body decodes
    pub fn name(&self) -> Option<String> {
        self.payload().ok().map(|payload| payload.job)
    }

    pub fn receipt_handle(&self) -> &ReceiptHandle {
        &self.message.receipt_handle
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_deleted_or_released(&self) -> bool {
        self.deleted || self.released
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    /// The underlying service message
    pub fn mns_message(&self) -> &ReceivedMessage {
        &self.message
    }
}

impl fmt::Debug for MnsJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MnsJob")
            .field("message_id", &self.message.message_id)
            .field("queue", &self.queue)
            .field("connection_name", &self.connection_name)
            .field("attempts", &self.message.dequeue_count)
            .field("released", &self.released)
            .field("deleted", &self.deleted)
            .finish()
    }
}
