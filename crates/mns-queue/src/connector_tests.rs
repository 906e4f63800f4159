//! Tests for the connector.

use super::*;
use crate::providers::InMemoryMnsClient;
use serde_json::json;

fn valid_config() -> ConnectionConfig {
    ConnectionConfig::new(
        "https://1234567890.mns.cn-hangzhou.aliyuncs.com",
        "LTAI-test-key",
        "test-secret",
        "default",
    )
}

#[test]
fn test_connect_with_valid_config() {
    let queue = MnsConnector::connect(&valid_config()).unwrap();

    assert_eq!(queue.get_queue(None), "default");
    assert_eq!(queue.connection_name(), "mns");
}

#[test]
fn test_connect_with_console_endpoint() {
    let mut config = valid_config();
    config.console_endpoint = Some("https://mns.cn-hangzhou.aliyuncs.com".to_string());
    config.region = Some("cn-hangzhou".to_string());

    let queue = MnsConnector::connect(&config).unwrap();

    assert!(format!("{:?}", queue).contains("console_client: true"));
}

#[test]
fn test_connect_rejects_missing_keys() {
    for key in ["endpoint", "key", "secret", "queue"] {
        let mut config = valid_config();
        match key {
            "endpoint" => config.endpoint = String::new(),
            "key" => config.key = String::new(),
            "secret" => config.secret = String::new(),
            _ => config.queue = String::new(),
        }

        match MnsConnector::connect(&config) {
            Err(QueueError::Configuration(ConfigurationError::Missing { key: missing })) => {
                assert_eq!(missing, key)
            }
            other => panic!("Expected missing '{}', got {:?}", key, other),
        }
    }
}

#[test]
fn test_connect_rejects_invalid_queue_name() {
    let mut config = valid_config();
    config.queue = "not a queue".to_string();

    let error = MnsConnector::connect(&config).unwrap_err();

    assert!(matches!(error, QueueError::Validation(_)));
}

#[test]
fn test_with_client_applies_queue_settings() {
    let mut config = valid_config();
    config.connection = "mns-secondary".to_string();
    config.wait_seconds = Some(10);
    config.clear_batch_limit = Some(4);

    let client = Arc::new(InMemoryMnsClient::default());
    let queue = MnsConnector::with_client(&config, client).unwrap();
    let rendered = format!("{:?}", queue);

    assert_eq!(queue.connection_name(), "mns-secondary");
    assert!(rendered.contains("wait_seconds: Some(10)"));
    assert!(rendered.contains("clear_batch_limit: Some(4)"));
}

#[test]
fn test_with_client_requires_queue() {
    let mut config = valid_config();
    config.queue = "  ".to_string();

    let result = MnsConnector::with_client(&config, Arc::new(InMemoryMnsClient::default()));

    assert!(matches!(
        result,
        Err(QueueError::Configuration(ConfigurationError::Missing { .. }))
    ));
}

#[tokio::test]
async fn test_with_client_round_trip() {
    let config = valid_config();
    let client = Arc::new(InMemoryMnsClient::default());
    let queue = MnsConnector::with_client(&config, client).unwrap();

    queue.push("greeting", &json!({"n": 1}), None).await.unwrap();
    let job = queue.pop(None).await.unwrap().unwrap();

    assert_eq!(job.name().as_deref(), Some("greeting"));
    assert_eq!(job.connection_name(), "mns");
}
