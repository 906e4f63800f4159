//! Job payload encoding and delay resolution.
//!
//! The queue adapter does not know how jobs are serialized or what "now" is;
//! both are injected through the [`PayloadBuilder`] and [`Clock`] traits.

use crate::error::{QueueError, SerializationError};
use crate::message::QueueName;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serialized job descriptor carried as the message body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub job: String,
    #[serde(default)]
    pub data: Value,
}

impl Payload {
    pub fn new(job: impl Into<String>, data: Value) -> Self {
        Self {
            job: job.into(),
            data,
        }
    }

    /// Decode a raw message body
    pub fn from_body(body: &str) -> Result<Self, SerializationError> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Turns a job and its data into a message body
pub trait PayloadBuilder: Send + Sync {
    fn build(&self, job: &str, queue: &QueueName, data: &Value) -> Result<String, QueueError>;
}

/// Encodes `{"job": ..., "data": ...}` as compact JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayloadBuilder;

impl PayloadBuilder for JsonPayloadBuilder {
    fn build(&self, job: &str, _queue: &QueueName, data: &Value) -> Result<String, QueueError> {
        let payload = Payload::new(job, data.clone());
        serde_json::to_string(&payload)
            .map_err(|e| QueueError::Serialization(SerializationError::JsonError(e)))
    }
}

// ============================================================================
// Delays
// ============================================================================

/// When a delayed job should become visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// Whole seconds from now
    Seconds(u64),
    /// Offset from now
    Duration(Duration),
    /// Absolute point in time
    At(DateTime<Utc>),
}

impl From<u64> for Delay {
    fn from(seconds: u64) -> Self {
        Self::Seconds(seconds)
    }
}

impl From<Duration> for Delay {
    fn from(duration: Duration) -> Self {
        Self::Duration(duration)
    }
}

impl From<DateTime<Utc>> for Delay {
    fn from(at: DateTime<Utc>) -> Self {
        Self::At(at)
    }
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Seconds from now until `delay` elapses, never negative
    fn seconds_until(&self, delay: &Delay) -> u32 {
        let seconds = match delay {
            Delay::Seconds(seconds) => i64::try_from(*seconds).unwrap_or(i64::MAX),
            Delay::Duration(duration) => duration.num_seconds(),
            Delay::At(at) => {
                // Partial seconds round up so `now + 60s` stays 60
                let millis = (*at - self.now()).num_milliseconds();
                millis.div_euclid(1000) + i64::from(millis.rem_euclid(1000) > 0)
            }
        };
        u32::try_from(seconds.max(0)).unwrap_or(u32::MAX)
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ============================================================================
// Jobs
// ============================================================================

/// A job queued through `bulk`, optionally delayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingJob {
    pub job: String,
    pub delay: Option<Delay>,
}

impl PendingJob {
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: impl Into<Delay>) -> Self {
        self.delay = Some(delay.into());
        self
    }
}

impl From<&str> for PendingJob {
    fn from(job: &str) -> Self {
        Self::new(job)
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
