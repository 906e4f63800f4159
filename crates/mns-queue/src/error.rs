//! Error types for queue operations.

use thiserror::Error;

/// Error code MNS returns when a queue holds no receivable message, or when a
/// receipt handle points at a message that is already gone.
pub const MESSAGE_NOT_EXIST: &str = "MessageNotExist";

/// Adapter-level error surfaced by every queue and job operation
#[derive(Debug, Error)]
pub enum QueueError {
    /// The service answered with a non-success result
    #[error("MNS request failed: {code} - {message}")]
    Remote { code: String, message: String },

    /// Transport or client construction failure, propagated unchanged
    #[error("MNS client error: {0}")]
    Client(MnsError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl QueueError {
    /// Remote error code, if the service produced one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => Some(code),
            Self::Client(MnsError::Service { code, .. }) => Some(code),
            _ => None,
        }
    }

    /// Check whether the service reported that the message does not exist
    pub fn is_message_not_exist(&self) -> bool {
        self.code() == Some(MESSAGE_NOT_EXIST)
    }

    /// Check if error is transient and the caller may retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Remote { code, .. } => is_transient_code(code),
            Self::Client(e) => e.is_transient(),
            Self::Serialization(_) => false,
            Self::Configuration(_) => false,
            Self::Validation(_) => false,
        }
    }
}

impl From<MnsError> for QueueError {
    fn from(error: MnsError) -> Self {
        match error {
            MnsError::Service { code, message, .. } => Self::Remote { code, message },
            other => Self::Client(other),
        }
    }
}

/// Errors raised by an MNS client implementation
#[derive(Debug, Error)]
pub enum MnsError {
    #[error("MNS service error ({status}): {code} - {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl MnsError {
    /// Build a service error without transport details
    pub fn service(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            status,
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Shorthand for the "queue empty" / "message gone" answer
    pub fn message_not_exist(message: impl Into<String>) -> Self {
        Self::service(404, MESSAGE_NOT_EXIST, message)
    }

    /// Check whether this is the `MessageNotExist` service answer
    pub fn is_message_not_exist(&self) -> bool {
        matches!(self, Self::Service { code, .. } if code == MESSAGE_NOT_EXIST)
    }

    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Service { status, code, .. } => *status >= 500 || is_transient_code(code),
            Self::Network(_) => true,
            Self::Serialization(_) => false,
            Self::Configuration(_) => false,
        }
    }
}

fn is_transient_code(code: &str) -> bool {
    matches!(code, "InternalError" | "ServiceUnavailable" | "TimeExpired")
}

/// Errors during payload serialization/deserialization
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Message body is not valid base64: {0}")]
    InvalidBase64(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
