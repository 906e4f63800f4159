//! Connection configuration consumed by the connector.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Environment variable prefix used by [`ConnectionConfig::load`]
pub const ENV_PREFIX: &str = "MNS_QUEUE";

/// Settings for one MNS queue connection
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Data-plane endpoint, e.g. `https://123456.mns.cn-hangzhou.aliyuncs.com`
    #[serde(default)]
    pub endpoint: String,
    /// Access key ID
    #[serde(default)]
    pub key: String,
    /// Access key secret
    #[serde(default)]
    pub secret: String,
    /// STS security token
    #[serde(default)]
    pub token: Option<String>,
    /// Default queue name
    #[serde(default)]
    pub queue: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Separate endpoint used for attribute queries
    #[serde(default)]
    pub console_endpoint: Option<String>,
    /// Connection name reported on popped jobs
    #[serde(default = "default_connection_name")]
    pub connection: String,
    /// Long-poll wait for `pop`; the queue's own setting applies when unset
    #[serde(default)]
    pub wait_seconds: Option<u32>,
    /// Upper bound on receive/delete rounds in `clear`
    #[serde(default)]
    pub clear_batch_limit: Option<u32>,
    #[serde(default)]
    pub http: HttpOptions,
}

fn default_connection_name() -> String {
    "mns".to_string()
}

impl ConnectionConfig {
    /// Create a configuration with the required keys and defaults elsewhere
    pub fn new(
        endpoint: impl Into<String>,
        key: impl Into<String>,
        secret: impl Into<String>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
            secret: secret.into(),
            token: None,
            queue: queue.into(),
            region: None,
            console_endpoint: None,
            connection: default_connection_name(),
            wait_seconds: None,
            clear_batch_limit: None,
            http: HttpOptions::default(),
        }
    }

    /// Load from an optional file, then `MNS_QUEUE__`-prefixed environment
    ///
    /// Later sources override earlier ones, e.g. `MNS_QUEUE__HTTP__TIMEOUT=90`
    /// sets `http.timeout`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Check that every required key is present
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (key, value) in [
            ("endpoint", &self.endpoint),
            ("key", &self.key),
            ("secret", &self.secret),
            ("queue", &self.queue),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigurationError::Missing {
                    key: key.to_string(),
                });
            }
        }

        if self.http.timeout == 0 {
            return Err(ConfigurationError::Invalid {
                message: "http.timeout must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("queue", &self.queue)
            .field("region", &self.region)
            .field("console_endpoint", &self.console_endpoint)
            .field("connection", &self.connection)
            .field("wait_seconds", &self.wait_seconds)
            .field("clear_batch_limit", &self.clear_batch_limit)
            .field("http", &self.http)
            .finish()
    }
}

/// HTTP transport options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpOptions {
    /// Request timeout in seconds; must exceed the longest long poll
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Connect timeout in seconds
    #[serde(default)]
    pub connect_timeout: Option<u64>,
    /// Base64-encode bodies on send and decode them on receive
    #[serde(default = "default_base64_body")]
    pub base64_body: bool,
}

fn default_timeout() -> u64 {
    60
}

fn default_base64_body() -> bool {
    true
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: None,
            base64_body: default_base64_body(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
