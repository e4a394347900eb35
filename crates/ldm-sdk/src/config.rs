//! 应用配置（TOML）
//!
//! 所有运行参数集中在 [`AppConfig`] 中，构造时传入驱动、处理层与 sink，
//! 不使用任何全局可变状态。
//!
//! ```toml
//! [transport]
//! kind = "serial"
//!
//! [transport.serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [mqtt]
//! host = "192.168.102.50"
//! port = 1883
//! topic = "sensor/meskernel/distance"
//! publish = { interval_ms = 500 }
//!
//! [reconnect]
//! max_attempts = 5
//! backoff_ms = 2000
//! ```

use ldm_driver::DeviceConfig;
use ldm_processing::{DrillDetectorConfig, ProcessingConfig};
use ldm_protocol::MeasureSpeed;
use ldm_sinks::{
    DEFAULT_MQTT_TOPIC, DEFAULT_QUEUE_CAPACITY, MqttSinkConfig, PayloadFormat, PublishPolicy,
    QosLevel,
};
use ldm_transport::{
    BluetoothAddress, DEFAULT_BAUD_RATE, DEFAULT_RFCOMM_CHANNEL, DEFAULT_SERIAL_PORT,
    TransportTarget,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// 配置错误（ConfigurationError）
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// 传输类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Serial,
    Bluetooth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSection {
    pub port: String,
    pub baud_rate: u32,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothSection {
    /// `AA:BB:CC:DD:EE:FF`
    pub address: String,
    pub channel: u8,
}

impl Default for BluetoothSection {
    fn default() -> Self {
        Self {
            address: String::new(),
            channel: DEFAULT_RFCOMM_CHANNEL,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    pub kind: TransportKind,
    pub serial: SerialSection,
    pub bluetooth: BluetoothSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSection {
    pub command_timeout_ms: u64,
    pub retries: u32,
    pub poll_interval_ms: u64,
    /// 连接时读取设备状态
    pub handshake: bool,
    /// 连续测量速度
    pub speed: MeasureSpeed,
}

impl Default for DriverSection {
    fn default() -> Self {
        let defaults = DeviceConfig::default();
        Self {
            command_timeout_ms: defaults.command_timeout.as_millis() as u64,
            retries: defaults.retries,
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
            handshake: defaults.handshake,
            speed: MeasureSpeed::Auto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSection {
    pub window_size: usize,
    pub staleness_ms: u64,
    pub min_quality: u8,
    pub max_distance_mm: u32,
    /// 钻进状态识别
    pub drill_detection: bool,
    pub drill: DrillDetectorConfig,
}

impl Default for ProcessingSection {
    fn default() -> Self {
        let defaults = ProcessingConfig::default();
        Self {
            window_size: defaults.window_size,
            staleness_ms: defaults.staleness.as_millis() as u64,
            min_quality: defaults.min_quality,
            max_distance_mm: defaults.max_distance_mm,
            drill_detection: true,
            drill: DrillDetectorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSection {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_s: u64,
    pub topic: String,
    pub qos: QosLevel,
    pub retain: bool,
    pub publish: PublishPolicy,
    pub format: PayloadFormat,
    pub suppress_low_confidence: bool,
    pub queue_capacity: usize,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            host: "192.168.102.50".to_string(),
            port: 1883,
            client_id: "ldm-bridge".to_string(),
            keep_alive_s: 30,
            topic: DEFAULT_MQTT_TOPIC.to_string(),
            qos: QosLevel::AtMostOnce,
            retain: false,
            publish: PublishPolicy::default(),
            format: PayloadFormat::Full,
            suppress_low_confidence: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSection {
    /// 连续失败多少个周期后放弃
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 2000,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub transport: TransportSection,
    pub driver: DriverSection,
    pub processing: ProcessingSection,
    pub mqtt: MqttSection,
    pub reconnect: ReconnectSection,
}

impl AppConfig {
    /// 从文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    /// 文件不存在时返回默认配置
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 校验后写入文件（自动创建父目录）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.validate()?;
        let path = path.as_ref();
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, self.to_toml()?).map_err(io_error)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transport_target()?
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.device_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let processing = &self.processing;
        if processing.window_size == 0 {
            return Err(ConfigError::Invalid(
                "processing.window_size must be greater than zero".to_string(),
            ));
        }
        if processing.max_distance_mm == 0 {
            return Err(ConfigError::Invalid(
                "processing.max_distance_mm must be greater than zero".to_string(),
            ));
        }
        if processing.drill.velocity_threshold_mm_s <= 0.0 {
            return Err(ConfigError::Invalid(
                "processing.drill.velocity_threshold_mm_s must be positive".to_string(),
            ));
        }

        if self.mqtt.host.trim().is_empty() {
            return Err(ConfigError::Invalid("mqtt.host is empty".to_string()));
        }
        if self.mqtt.port == 0 {
            return Err(ConfigError::Invalid("mqtt.port must not be 0".to_string()));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::Invalid("mqtt.client_id is empty".to_string()));
        }
        if self.mqtt.keep_alive_s == 0 {
            return Err(ConfigError::Invalid(
                "mqtt.keep_alive_s must be at least 1".to_string(),
            ));
        }
        self.mqtt_sink_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "reconnect.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// 按 `transport.kind` 选择目标
    pub fn transport_target(&self) -> Result<TransportTarget, ConfigError> {
        match self.transport.kind {
            TransportKind::Serial => Ok(TransportTarget::serial(
                self.transport.serial.port.clone(),
                self.transport.serial.baud_rate,
            )),
            TransportKind::Bluetooth => {
                let address: BluetoothAddress = self
                    .transport
                    .bluetooth
                    .address
                    .parse()
                    .map_err(|e: ldm_transport::TransportError| ConfigError::Invalid(e.to_string()))?;
                Ok(TransportTarget::bluetooth(address, self.transport.bluetooth.channel))
            },
        }
    }

    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            command_timeout: Duration::from_millis(self.driver.command_timeout_ms),
            retries: self.driver.retries,
            poll_interval: Duration::from_millis(self.driver.poll_interval_ms),
            handshake: self.driver.handshake,
            ..DeviceConfig::default()
        }
    }

    pub fn processing_config(&self) -> ProcessingConfig {
        ProcessingConfig {
            window_size: self.processing.window_size,
            staleness: Duration::from_millis(self.processing.staleness_ms),
            min_quality: self.processing.min_quality,
            max_distance_mm: self.processing.max_distance_mm,
            drill: self.processing.drill_detection.then_some(self.processing.drill),
        }
    }

    pub fn mqtt_sink_config(&self) -> MqttSinkConfig {
        MqttSinkConfig {
            topic: self.mqtt.topic.clone(),
            qos: self.mqtt.qos,
            retain: self.mqtt.retain,
            publish: self.mqtt.publish,
            format: self.mqtt.format,
            suppress_low_confidence: self.mqtt.suppress_low_confidence,
            queue_capacity: self.mqtt.queue_capacity,
        }
    }

    #[cfg(feature = "mqtt")]
    pub fn rumqttc_config(&self) -> ldm_sinks::RumqttcConfig {
        ldm_sinks::RumqttcConfig {
            host: self.mqtt.host.clone(),
            port: self.mqtt.port,
            client_id: self.mqtt.client_id.clone(),
            keep_alive: Duration::from_secs(self.mqtt.keep_alive_s),
            ..Default::default()
        }
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect.backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.transport_target().unwrap(),
            TransportTarget::serial("/dev/ttyUSB0", 115_200)
        );
        assert_eq!(config.mqtt.host, "192.168.102.50");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topic, "sensor/meskernel/distance");
        assert_eq!(
            config.mqtt.publish,
            PublishPolicy::Interval(Duration::from_millis(500))
        );
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.device_config(), DeviceConfig::default());
        assert!(config.processing_config().drill.is_some());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
[transport]
kind = "bluetooth"

[transport.bluetooth]
address = "00:21:13:0A:1B:2C"

[driver]
speed = "fast"

[mqtt]
topic = "lab/rig1"
publish = { every_nth = 10 }
qos = 1
"#,
        )
        .unwrap();

        assert_eq!(
            config.transport_target().unwrap(),
            TransportTarget::bluetooth(BluetoothAddress([0x00, 0x21, 0x13, 0x0A, 0x1B, 0x2C]), 1)
        );
        assert_eq!(config.driver.speed, MeasureSpeed::Fast);
        assert_eq!(config.driver.retries, 2);
        assert_eq!(config.mqtt.topic, "lab/rig1");
        assert_eq!(config.mqtt.qos, QosLevel::AtLeastOnce);
        assert_eq!(config.mqtt.publish, PublishPolicy::EveryNth(10));
        assert_eq!(config.mqtt.host, "192.168.102.50");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            "[transport.serial]\nbaud_rate = 0",
            "[transport.serial]\nport = \"\"",
            "[transport]\nkind = \"bluetooth\"\n[transport.bluetooth]\naddress = \"not-an-address\"",
            "[mqtt]\ntopic = \"\"",
            "[mqtt]\npublish = { every_nth = 0 }",
            "[processing]\nwindow_size = 0",
            "[driver]\nretries = 99",
            "[reconnect]\nmax_attempts = 0",
        ];
        for case in cases {
            assert!(
                matches!(AppConfig::from_toml(case), Err(ConfigError::Invalid(_))),
                "accepted: {case}"
            );
        }
        assert!(matches!(
            AppConfig::from_toml("[mqtt]\nqos = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = AppConfig::default();
        config.mqtt.retain = true;
        config.processing.drill_detection = false;
        let text = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml(&text).unwrap(), config);
    }
}
