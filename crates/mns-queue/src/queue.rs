//! Queue adapter mapping the generic queue contract onto MNS calls.
//!
//! ## Example
//!
//! ```no_run
//! use mns_queue::{ConnectionConfig, MnsConnector};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), mns_queue::QueueError> {
//! let config = ConnectionConfig::new(
//!     "https://1234567890.mns.cn-hangzhou.aliyuncs.com",
//!     "LTAI-access-key",
//!     "access-secret",
//!     "default",
//! );
//! let queue = MnsConnector::connect(&config)?;
//!
//! queue.push("greeting", &json!({"message": "Hello world!"}), None).await?;
//!
//! if let Some(mut job) = queue.pop(None).await? {
//!     println!("{} (attempt {})", job.raw_body(), job.attempts());
//!     job.delete().await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::{MnsClient, MAX_BATCH_RECEIVE, MAX_WAIT_SECONDS};
use crate::error::{QueueError, MESSAGE_NOT_EXIST};
use crate::job::MnsJob;
use crate::message::{MessageId, QueueName, ReceiptHandle, SendMessageRequest, SendOptions};
use crate::payload::{Clock, Delay, JsonPayloadBuilder, PayloadBuilder, PendingJob, SystemClock};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

/// Queue adapter bound to one MNS client and a default queue
///
/// Holds no mutable state; share it freely behind an `Arc`.
pub struct MnsQueue {
    client: Arc<dyn MnsClient>,
    console_client: Option<Arc<dyn MnsClient>>,
    default_queue: QueueName,
    connection_name: String,
    payload_builder: Arc<dyn PayloadBuilder>,
    clock: Arc<dyn Clock>,
    wait_seconds: Option<u32>,
    clear_batch_limit: Option<u32>,
}

impl MnsQueue {
    /// Create an adapter with JSON payloads and the system clock
    pub fn new(client: Arc<dyn MnsClient>, default_queue: QueueName) -> Self {
        Self {
            client,
            console_client: None,
            default_queue,
            connection_name: "mns".to_string(),
            payload_builder: Arc::new(JsonPayloadBuilder),
            clock: Arc::new(SystemClock),
            wait_seconds: None,
            clear_batch_limit: None,
        }
    }

    /// Route attribute queries (`size`) through a separate client
    pub fn with_console_client(mut self, client: Arc<dyn MnsClient>) -> Self {
        self.console_client = Some(client);
        self
    }

    pub fn with_payload_builder(mut self, builder: Arc<dyn PayloadBuilder>) -> Self {
        self.payload_builder = builder;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_connection_name(mut self, name: impl Into<String>) -> Self {
        self.connection_name = name.into();
        self
    }

    /// Long-poll wait for `pop`, capped at the service maximum
    pub fn with_wait_seconds(mut self, seconds: u32) -> Self {
        self.wait_seconds = Some(seconds.min(MAX_WAIT_SECONDS));
        self
    }

    /// Stop `clear` after this many receive/delete rounds
    pub fn with_clear_batch_limit(mut self, limit: u32) -> Self {
        self.clear_batch_limit = Some(limit);
        self
    }

    pub fn connection_name(&self) -> &str {
        &self.connection_name
    }

    /// Name of the queue an operation targets: `queue` if given, else the default
    pub fn get_queue(&self, queue: Option<&str>) -> String {
        match queue {
            Some(name) => name.to_string(),
            None => self.default_queue.to_string(),
        }
    }

    fn resolve_queue(&self, queue: Option<&str>) -> Result<QueueName, QueueError> {
        match queue {
            Some(name) => Ok(QueueName::new(name.to_string())?),
            None => Ok(self.default_queue.clone()),
        }
    }

    /// Approximate number of messages in the queue, in any state
    pub async fn size(&self, queue: Option<&str>) -> Result<u64, QueueError> {
        let queue = self.resolve_queue(queue)?;
        let client = self.console_client.as_ref().unwrap_or(&self.client);

        let attributes = client.get_queue_attributes(&queue).await?;
        let size = attributes.total_messages();

        debug!(
            queue = %queue,
            active = ?attributes.active_messages,
            inactive = ?attributes.inactive_messages,
            delayed = ?attributes.delay_messages,
            size,
            "Queue size fetched"
        );
        Ok(size)
    }

    /// Serialize a job and send it
    pub async fn push(
        &self,
        job: &str,
        data: &Value,
        queue: Option<&str>,
    ) -> Result<MessageId, QueueError> {
        let queue_name = self.resolve_queue(queue)?;
        let payload = self.payload_builder.build(job, &queue_name, data)?;
        self.send(&queue_name, SendMessageRequest::new(payload)).await
    }

    /// Send an already-serialized payload with passthrough options
    pub async fn push_raw(
        &self,
        payload: &str,
        queue: Option<&str>,
        options: &SendOptions,
    ) -> Result<MessageId, QueueError> {
        let queue_name = self.resolve_queue(queue)?;
        self.send(
            &queue_name,
            SendMessageRequest::new(payload).with_options(options),
        )
        .await
    }

    /// Serialize a job and send it with a delivery delay
    pub async fn later(
        &self,
        delay: impl Into<Delay>,
        job: &str,
        data: &Value,
        queue: Option<&str>,
    ) -> Result<MessageId, QueueError> {
        let delay_seconds = self.clock.seconds_until(&delay.into());
        let queue_name = self.resolve_queue(queue)?;
        let payload = self.payload_builder.build(job, &queue_name, data)?;

        let request = SendMessageRequest {
            delay_seconds: Some(delay_seconds),
            ..SendMessageRequest::new(payload)
        };
        self.send(&queue_name, request).await
    }

    /// Push each job in order; the first failure aborts the rest
    pub async fn bulk(
        &self,
        jobs: &[PendingJob],
        data: &Value,
        queue: Option<&str>,
    ) -> Result<Vec<MessageId>, QueueError> {
        let mut message_ids = Vec::with_capacity(jobs.len());

        for pending in jobs {
            let message_id = match pending.delay {
                Some(delay) => self.later(delay, &pending.job, data, queue).await?,
                None => self.push(&pending.job, data, queue).await?,
            };
            message_ids.push(message_id);
        }

        Ok(message_ids)
    }

    /// Receive the next job, or `None` when the queue is empty
    pub async fn pop(&self, queue: Option<&str>) -> Result<Option<MnsJob>, QueueError> {
        let queue = self.resolve_queue(queue)?;

        let message = match self.client.receive_message(&queue, self.wait_seconds).await {
            Ok(message) => message,
            Err(e) if e.is_message_not_exist() => {
                debug!(queue = %queue, "Queue empty");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        debug!(
            queue = %queue,
            message_id = %message.message_id,
            dequeue_count = message.dequeue_count,
            "Job received"
        );

        Ok(Some(MnsJob::new(
            Arc::clone(&self.client),
            message,
            self.connection_name.clone(),
            queue,
        )))
    }

    /// Drain the queue, returning how many messages this call deleted
    ///
    /// Messages that vanish between receive and delete (`MessageNotExist`)
    /// are not counted. Any other per-message delete failure aborts.
    pub async fn clear(&self, queue: &str) -> Result<u64, QueueError> {
        let queue = QueueName::new(queue.to_string())?;
        let mut cleared: u64 = 0;
        let mut batches: u32 = 0;

        loop {
            if let Some(limit) = self.clear_batch_limit {
                if batches >= limit {
                    warn!(
                        queue = %queue,
                        batches,
                        cleared,
                        "Clear stopped at batch limit"
                    );
                    break;
                }
            }

            let messages = match self
                .client
                .batch_receive_message(&queue, MAX_BATCH_RECEIVE, Some(MAX_WAIT_SECONDS))
                .await
            {
                Ok(messages) => messages,
                Err(e) if e.is_message_not_exist() => break,
                Err(e) => return Err(e.into()),
            };
            batches += 1;

            if messages.is_empty() {
                break;
            }

            let handles: Vec<ReceiptHandle> = messages
                .into_iter()
                .map(|message| message.receipt_handle)
                .collect();
            let outcome = self.client.batch_delete_message(&queue, &handles).await?;

            let mut deleted = handles.len() as u64;
            for failure in outcome.failures {
                if failure.error_code != MESSAGE_NOT_EXIST {
                    return Err(QueueError::Remote {
                        code: failure.error_code,
                        message: failure.error_message,
                    });
                }
                deleted = deleted.saturating_sub(1);
            }

            debug!(queue = %queue, batch = batches, deleted, "Batch cleared");
            cleared += deleted;
        }

        info!(queue = %queue, cleared, "Queue cleared");
        Ok(cleared)
    }

    async fn send(
        &self,
        queue: &QueueName,
        request: SendMessageRequest,
    ) -> Result<MessageId, QueueError> {
        let delay_seconds = request.delay_seconds;
        let response = self.client.send_message(queue, request).await?;

        debug!(
            queue = %queue,
            message_id = %response.message_id,
            delay_seconds = ?delay_seconds,
            "Message sent"
        );
        Ok(response.message_id)
    }
}

impl fmt::Debug for MnsQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MnsQueue")
            .field("default_queue", &self.default_queue)
            .field("connection_name", &self.connection_name)
            .field("console_client", &self.console_client.is_some())
            .field("wait_seconds", &self.wait_seconds)
            .field("clear_batch_limit", &self.clear_batch_limit)
            .finish()
    }
}
