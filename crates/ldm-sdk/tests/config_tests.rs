//! 配置文件读写测试

use ldm_sdk::{AppConfig, ConfigError, TransportKind};
use ldm_sinks::{PayloadFormat, PublishPolicy};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = AppConfig::default();
    config.transport.serial.port = "/dev/ttyACM3".to_string();
    config.mqtt.topic = "lab/rig2/distance".to_string();
    config.mqtt.publish = PublishPolicy::EveryNth(3);
    config.mqtt.format = PayloadFormat::Minimal;
    config.reconnect.backoff_ms = 750;
    config.save(&path).unwrap();

    let loaded = AppConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.reconnect_backoff(), Duration::from_millis(750));
    assert_eq!(loaded.mqtt_sink_config().publish, PublishPolicy::EveryNth(3));
}

#[test]
fn test_load_or_default_without_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.toml");

    let config = AppConfig::load_or_default(&path).unwrap();
    assert_eq!(config, AppConfig::default());
    assert!(!path.exists());
}

#[test]
fn test_load_missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.toml");

    match AppConfig::load(&path) {
        Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected Io error, got {:?}", other),
    }
}

#[test]
fn test_load_rejects_invalid_file() {
    let dir = TempDir::new().unwrap();

    let path = dir.path().join("bluetooth.toml");
    fs::write(
        &path,
        r#"
[transport]
kind = "bluetooth"

[transport.bluetooth]
address = "not-an-address"
"#,
    )
    .unwrap();
    assert!(matches!(AppConfig::load(&path), Err(ConfigError::Invalid(_))));

    let path = dir.path().join("broken.toml");
    fs::write(&path, "[mqtt\nport = 1883").unwrap();
    assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn test_bluetooth_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[transport]
kind = "bluetooth"

[transport.bluetooth]
address = "00:21:13:0A:BC:DE"
channel = 2
"#,
    )
    .unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.transport.kind, TransportKind::Bluetooth);
    let target = config.transport_target().unwrap();
    assert!(target.to_string().contains("00:21:13:0A:BC:DE"));
}

#[test]
fn test_save_refuses_invalid_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = AppConfig::default();
    config.reconnect.max_attempts = 0;
    assert!(matches!(config.save(&path), Err(ConfigError::Invalid(_))));
    assert!(!path.exists());
}
