//! Scripted MNS client used by adapter and job tests.
//!
//! Each operation pops the next scripted result; when nothing is scripted it
//! falls back to a neutral success (or `MessageNotExist` for receives). Every
//! call is recorded for later assertions.

use crate::client::MnsClient;
use crate::error::MnsError;
use crate::message::{
    BatchDeleteOutcome, MessageId, QueueAttributes, QueueName, ReceiptHandle, ReceivedMessage,
    SendMessageRequest, SendMessageResponse, Timestamp, VisibilityChange,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One recorded client call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SendMessage {
        queue: String,
        request: SendMessageRequest,
    },
    ReceiveMessage {
        queue: String,
        wait_seconds: Option<u32>,
    },
    BatchReceiveMessage {
        queue: String,
        num_of_messages: u32,
        wait_seconds: Option<u32>,
    },
    BatchDeleteMessage {
        queue: String,
        receipt_handles: Vec<String>,
    },
    ChangeMessageVisibility {
        queue: String,
        receipt_handle: String,
        visibility_timeout: u32,
    },
    DeleteMessage {
        queue: String,
        receipt_handle: String,
    },
    GetQueueAttributes {
        queue: String,
    },
}

#[derive(Default)]
pub struct StubClient {
    calls: Mutex<Vec<Call>>,
    send: Mutex<VecDeque<Result<SendMessageResponse, MnsError>>>,
    receive: Mutex<VecDeque<Result<ReceivedMessage, MnsError>>>,
    batch_receive: Mutex<VecDeque<Result<Vec<ReceivedMessage>, MnsError>>>,
    batch_delete: Mutex<VecDeque<Result<BatchDeleteOutcome, MnsError>>>,
    visibility: Mutex<VecDeque<Result<VisibilityChange, MnsError>>>,
    delete: Mutex<VecDeque<Result<(), MnsError>>>,
    attributes: Mutex<VecDeque<Result<QueueAttributes, MnsError>>>,
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent_requests(&self) -> Vec<SendMessageRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SendMessage { request, .. } => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn on_send(&self, result: Result<SendMessageResponse, MnsError>) -> &Self {
        self.send.lock().unwrap().push_back(result);
        self
    }

    pub fn on_receive(&self, result: Result<ReceivedMessage, MnsError>) -> &Self {
        self.receive.lock().unwrap().push_back(result);
        self
    }

    pub fn on_batch_receive(&self, result: Result<Vec<ReceivedMessage>, MnsError>) -> &Self {
        self.batch_receive.lock().unwrap().push_back(result);
        self
    }

    pub fn on_batch_delete(&self, result: Result<BatchDeleteOutcome, MnsError>) -> &Self {
        self.batch_delete.lock().unwrap().push_back(result);
        self
    }

    pub fn on_change_visibility(&self, result: Result<VisibilityChange, MnsError>) -> &Self {
        self.visibility.lock().unwrap().push_back(result);
        self
    }

    pub fn on_delete(&self, result: Result<(), MnsError>) -> &Self {
        self.delete.lock().unwrap().push_back(result);
        self
    }

    pub fn on_attributes(&self, result: Result<QueueAttributes, MnsError>) -> &Self {
        self.attributes.lock().unwrap().push_back(result);
        self
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn next<T>(script: &Mutex<VecDeque<Result<T, MnsError>>>) -> Option<Result<T, MnsError>> {
    script.lock().unwrap().pop_front()
}

/// Build a received message with the given identity and body
pub fn received(
    message_id: &str,
    receipt_handle: &str,
    body: &str,
    dequeue_count: u32,
) -> ReceivedMessage {
    ReceivedMessage {
        message_id: message_id.parse().unwrap(),
        receipt_handle: ReceiptHandle::from(receipt_handle),
        body: body.to_string(),
        body_md5: None,
        dequeue_count,
        enqueue_time: Some(Timestamp::now()),
        first_dequeue_time: None,
        next_visible_time: None,
        priority: None,
    }
}

/// Build `count` messages with distinct ids and handles
pub fn received_batch(prefix: &str, count: usize) -> Vec<ReceivedMessage> {
    (0..count)
        .map(|i| {
            received(
                &format!("{}-{}", prefix, i),
                &format!("handle-{}-{}", prefix, i),
                "{}",
                1,
            )
        })
        .collect()
}

pub fn sent(message_id: &str) -> SendMessageResponse {
    SendMessageResponse {
        message_id: message_id.parse().unwrap(),
        body_md5: None,
    }
}

#[async_trait]
impl MnsClient for StubClient {
    async fn send_message(
        &self,
        queue: &QueueName,
        request: SendMessageRequest,
    ) -> Result<SendMessageResponse, MnsError> {
        self.record(Call::SendMessage {
            queue: queue.to_string(),
            request,
        });
        next(&self.send).unwrap_or_else(|| {
            Ok(SendMessageResponse {
                message_id: MessageId::generate(),
                body_md5: None,
            })
        })
    }

    async fn receive_message(
        &self,
        queue: &QueueName,
        wait_seconds: Option<u32>,
    ) -> Result<ReceivedMessage, MnsError> {
        self.record(Call::ReceiveMessage {
            queue: queue.to_string(),
            wait_seconds,
        });
        next(&self.receive)
            .unwrap_or_else(|| Err(MnsError::message_not_exist("Message not exist.")))
    }

    async fn batch_receive_message(
        &self,
        queue: &QueueName,
        num_of_messages: u32,
        wait_seconds: Option<u32>,
    ) -> Result<Vec<ReceivedMessage>, MnsError> {
        self.record(Call::BatchReceiveMessage {
            queue: queue.to_string(),
            num_of_messages,
            wait_seconds,
        });
        next(&self.batch_receive)
            .unwrap_or_else(|| Err(MnsError::message_not_exist("Message not exist.")))
    }

    async fn batch_delete_message(
        &self,
        queue: &QueueName,
        receipt_handles: &[ReceiptHandle],
    ) -> Result<BatchDeleteOutcome, MnsError> {
        self.record(Call::BatchDeleteMessage {
            queue: queue.to_string(),
            receipt_handles: receipt_handles.iter().map(|h| h.to_string()).collect(),
        });
        next(&self.batch_delete).unwrap_or_else(|| Ok(BatchDeleteOutcome::default()))
    }

    async fn change_message_visibility(
        &self,
        queue: &QueueName,
        receipt_handle: &ReceiptHandle,
        visibility_timeout: u32,
    ) -> Result<VisibilityChange, MnsError> {
        self.record(Call::ChangeMessageVisibility {
            queue: queue.to_string(),
            receipt_handle: receipt_handle.to_string(),
            visibility_timeout,
        });
        next(&self.visibility).unwrap_or_else(|| {
            Ok(VisibilityChange {
                receipt_handle: ReceiptHandle::new(format!("{}-next", receipt_handle)),
                next_visible_time: None,
            })
        })
    }

    async fn delete_message(
        &self,
        queue: &QueueName,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MnsError> {
        self.record(Call::DeleteMessage {
            queue: queue.to_string(),
            receipt_handle: receipt_handle.to_string(),
        });
        next(&self.delete).unwrap_or(Ok(()))
    }

    async fn get_queue_attributes(&self, queue: &QueueName) -> Result<QueueAttributes, MnsError> {
        self.record(Call::GetQueueAttributes {
            queue: queue.to_string(),
        });
        next(&self.attributes).unwrap_or_else(|| Ok(QueueAttributes::default()))
    }
}
