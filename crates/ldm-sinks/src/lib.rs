//! # LDM Sinks
//!
//! 处理后样本的消费者：
//!
//! - [`display`]: 实时显示 sink（有界队列，溢出时丢弃最旧样本）
//! - [`mqtt`]: MQTT 发布 sink（节流，交给独立发布线程）
//! - [`publisher`]: MQTT 发布器抽象与 rumqttc 实现
//!
//! 所有 sink 都在 pipeline 线程上被调用，`accept` 不会阻塞。

use thiserror::Error;

pub mod display;
pub mod mqtt;
pub mod payload;
pub mod publisher;
pub mod throttle;

pub use display::{DEFAULT_DISPLAY_CAPACITY, DisplayFeed, DisplaySink, DisplayUpdate, display_channel};
pub use mqtt::{DEFAULT_MQTT_TOPIC, DEFAULT_QUEUE_CAPACITY, MqttSink, MqttSinkConfig, MqttSinkMetrics, MqttSinkStats};
pub use payload::{MqttPayload, PayloadFormat};
#[cfg(feature = "mqtt")]
pub use publisher::{RumqttcConfig, RumqttcPublisher};
pub use publisher::{MqttMessage, MqttPublisher, QosLevel};
pub use throttle::{DEFAULT_PUBLISH_INTERVAL, PublishPolicy, PublishThrottle};

/// Sink 层错误
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Invalid sink configuration: {0}")]
    Configuration(String),

    #[error("Payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[cfg(feature = "mqtt")]
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
