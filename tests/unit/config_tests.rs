use std::time::Duration;

use cmd_broker::{config::BrokerConfig, AppError};

fn sample_toml() -> &'static str {
    r#"
name = "broker-under-test"
capacity = 4
queue_depth = 16
max_message_size = 2048
shell = "/bin/bash"
exec_timeout_seconds = 30
shutdown_grace_seconds = 1
"#
}

#[test]
fn parses_valid_config() {
    let config = BrokerConfig::from_toml_str(sample_toml()).expect("config parses");

    assert_eq!(config.name, "broker-under-test");
    assert_eq!(config.capacity, 4);
    assert_eq!(config.queue_depth, 16);
    assert_eq!(config.max_message_size, 2048);
    assert_eq!(config.shell, "/bin/bash");
    assert_eq!(config.exec_timeout(), Some(Duration::from_secs(30)));
    assert_eq!(config.shutdown_grace(), Duration::from_secs(1));
}

#[test]
fn empty_document_yields_defaults() {
    let config = BrokerConfig::from_toml_str("").expect("empty config parses");
    assert_eq!(config, BrokerConfig::default());
    assert_eq!(config.name, "cmd-broker");
    assert_eq!(config.capacity, 10);
    assert_eq!(config.queue_depth, 10);
    assert_eq!(config.max_message_size, 1024);
    assert_eq!(config.shell, "sh");
}

#[test]
fn zero_exec_timeout_means_unbounded() {
    let config = BrokerConfig::default();
    assert_eq!(config.exec_timeout_seconds, 0);
    assert!(config.exec_timeout().is_none());
}

#[test]
fn payload_limit_excludes_terminator() {
    let config = BrokerConfig::default();
    assert_eq!(config.max_payload_bytes(), 1023);
    assert!(config.max_frame_bytes() > config.max_message_size);
}

#[test]
fn zero_capacity_is_rejected() {
    let err = BrokerConfig::from_toml_str("capacity = 0").expect_err("must reject");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("capacity")));
}

#[test]
fn zero_queue_depth_is_rejected() {
    let err = BrokerConfig::from_toml_str("queue_depth = 0").expect_err("must reject");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("queue_depth")));
}

#[test]
fn tiny_message_size_is_rejected() {
    let err = BrokerConfig::from_toml_str("max_message_size = 16").expect_err("must reject");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("max_message_size")));
}

#[test]
fn blank_name_is_rejected() {
    let err = BrokerConfig::from_toml_str("name = \"  \"").expect_err("must reject");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn invalid_toml_is_config_error() {
    let err = BrokerConfig::from_toml_str("capacity = \"ten\"").expect_err("must reject");
    assert!(err.to_string().starts_with("config: invalid config"));
}

#[test]
fn loads_from_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, sample_toml()).expect("write config");

    let config = BrokerConfig::load_from_path(&path).expect("config loads");
    assert_eq!(config.name, "broker-under-test");
}

#[test]
fn missing_file_is_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let err = BrokerConfig::load_from_path(temp.path().join("absent.toml"))
        .expect_err("missing file must fail");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("failed to read config")));
}
