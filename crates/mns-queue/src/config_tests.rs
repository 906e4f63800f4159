//! Tests for connection configuration.

use super::*;
use std::io::Write;

fn valid_config() -> ConnectionConfig {
    ConnectionConfig::new(
        "https://1234567890.mns.cn-hangzhou.aliyuncs.com",
        "LTAI-test-key",
        "test-secret",
        "default",
    )
}

#[test]
fn test_defaults() {
    let config = valid_config();
    assert_eq!(config.connection, "mns");
    assert_eq!(config.http.timeout, 60);
    assert!(config.http.base64_body);
    assert!(config.wait_seconds.is_none());
    assert!(config.clear_batch_limit.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_required_keys() {
    for key in ["endpoint", "key", "secret", "queue"] {
        let mut config = valid_config();
        match key {
            "endpoint" => config.endpoint.clear(),
            "key" => config.key.clear(),
            "secret" => config.secret.clear(),
            _ => config.queue.clear(),
        }

        match config.validate() {
            Err(ConfigurationError::Missing { key: missing }) => assert_eq!(missing, key),
            other => panic!("Expected missing '{}', got {:?}", key, other),
        }
    }
}

#[test]
fn test_zero_timeout_is_invalid() {
    let mut config = valid_config();
    config.http.timeout = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigurationError::Invalid { .. })
    ));
}

#[test]
fn test_debug_redacts_secrets() {
    let mut config = valid_config();
    config.token = Some("sts-token".to_string());

    let rendered = format!("{:?}", config);
    assert!(!rendered.contains("test-secret"));
    assert!(!rendered.contains("sts-token"));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn test_deserialize_applies_defaults() {
    let config: ConnectionConfig = serde_json::from_str(
        r#"{
            "endpoint": "https://1.mns.cn-shanghai.aliyuncs.com",
            "key": "k",
            "secret": "s",
            "queue": "jobs",
            "http": {"timeout": 90}
        }"#,
    )
    .unwrap();

    assert_eq!(config.queue, "jobs");
    assert_eq!(config.http.timeout, 90);
    assert!(config.http.base64_body);
    assert_eq!(config.connection, "mns");
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
endpoint = "https://1.mns.cn-beijing.aliyuncs.com"
key = "key-id"
secret = "key-secret"
queue = "orders"
region = "cn-beijing"
wait_seconds = 10

[http]
timeout = 45
base64_body = false
"#
    )
    .unwrap();

    let config = ConnectionConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.queue, "orders");
    assert_eq!(config.region.as_deref(), Some("cn-beijing"));
    assert_eq!(config.wait_seconds, Some(10));
    assert_eq!(config.http.timeout, 45);
    assert!(!config.http.base64_body);
}

#[test]
fn test_load_rejects_incomplete_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, r#"endpoint = "https://1.mns.cn-beijing.aliyuncs.com""#).unwrap();

    assert!(ConnectionConfig::load(Some(file.path())).is_err());
}
