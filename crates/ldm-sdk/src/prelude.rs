//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use ldm_sdk::prelude::*;
//! ```

// 驱动层
pub use crate::driver::{DeviceBuilder, DeviceEvent, DeviceInfo, LaserDevice, SessionState};

// 协议层
pub use crate::protocol::{Command, DeviceStatus, MeasureSpeed, Measurement};

// 传输层
pub use crate::transport::{BluetoothAddress, TransportTarget};

// 处理层
pub use crate::processing::{
    PipelineInput, ProcessedSample, ProcessingConfig, SampleSink, spawn_pipeline,
};

// 输出层
pub use crate::sinks::{DisplayFeed, DisplaySink, MqttSink, MqttSinkConfig, PublishPolicy, display_channel};

// 配置与桥接
pub use crate::{AppConfig, MqttBridge, ShutdownSignal};

// 错误类型
pub use crate::config::ConfigError;
pub use crate::driver::DriverError;
pub use crate::protocol::ProtocolError;
pub use crate::transport::TransportError;
pub use crate::SdkError;
