//! Builds queue adapters from connection settings.

use crate::client::MnsClient;
use crate::config::ConnectionConfig;
use crate::error::{ConfigurationError, QueueError};
use crate::message::QueueName;
use crate::providers::MnsHttpClient;
use crate::queue::MnsQueue;
use std::sync::Arc;
use tracing::info;

#[cfg(test)]
#[path = "connector_tests.rs"]
mod tests;

/// Factory for [`MnsQueue`] instances
pub struct MnsConnector;

impl MnsConnector {
    /// Validate `config`, build the HTTP clients and bind them to the default queue
    ///
    /// A console client is created only when `console_endpoint` is set; it then
    /// serves `size` queries. No network calls are made here.
    pub fn connect(config: &ConnectionConfig) -> Result<MnsQueue, QueueError> {
        config.validate()?;

        let client = MnsHttpClient::from_config(config).map_err(QueueError::Client)?;
        let console = MnsHttpClient::console_from_config(config).map_err(QueueError::Client)?;

        info!(
            endpoint = client.endpoint(),
            queue = %config.queue,
            connection = %config.connection,
            "MNS connection configured"
        );

        let mut queue = Self::with_client(config, Arc::new(client))?;
        if let Some(console) = console {
            info!(
                endpoint = console.endpoint(),
                region = ?config.region,
                "Using console endpoint for queue attributes"
            );
            queue = queue.with_console_client(Arc::new(console));
        }

        Ok(queue)
    }

    /// Bind an already-built client using the queue settings of `config`
    ///
    /// Endpoint and credentials are ignored; only `queue`, `connection`,
    /// `wait_seconds` and `clear_batch_limit` apply.
    pub fn with_client(
        config: &ConnectionConfig,
        client: Arc<dyn MnsClient>,
    ) -> Result<MnsQueue, QueueError> {
        if config.queue.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "queue".to_string(),
            }
            .into());
        }

        let default_queue = QueueName::new(config.queue.clone())?;
        let mut queue = MnsQueue::new(client, default_queue)
            .with_connection_name(config.connection.clone());

        if let Some(wait_seconds) = config.wait_seconds {
            queue = queue.with_wait_seconds(wait_seconds);
        }
        if let Some(limit) = config.clear_batch_limit {
            queue = queue.with_clear_batch_limit(limit);
        }

        Ok(queue)
    }
}
