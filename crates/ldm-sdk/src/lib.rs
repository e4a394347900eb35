//! LDM SDK - Meskernel 激光测距传感器 Rust SDK
//!
//! 通过串口或蓝牙与 LDJ100-755 通信，实时计算速度与滚动统计，并发布到 MQTT。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **传输层** (`transport`): 串口 / 蓝牙 RFCOMM 字节流
//! - **协议层** (`protocol`): 帧编解码与命令定义
//! - **驱动层** (`driver`): IO 线程、命令/响应匹配、会话状态机
//! - **处理层** (`processing`): 速度、滚动统计、钻进状态
//! - **输出层** (`sinks`): 实时显示与 MQTT 发布
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use ldm_sdk::prelude::*;
//!
//! # fn main() -> Result<(), SdkError> {
//! let config = AppConfig::default();
//! let device = LaserDevice::builder().config(config.device_config()).build()?;
//! device.connect(config.transport_target()?)?;
//! let measurement = device.measure_once(MeasureSpeed::Auto)?;
//! println!("{} mm", measurement.distance_mm);
//! # Ok(())
//! # }
//! ```
//!
//! 无人值守的 MQTT 模式见 [`bridge::MqttBridge`]。

pub use ldm_driver as driver;
pub use ldm_processing as processing;
pub use ldm_protocol as protocol;
pub use ldm_sinks as sinks;
pub use ldm_transport as transport;

pub mod bridge;
pub mod config;
mod error;
mod logging;

pub mod prelude;

pub use bridge::{BridgeReport, MqttBridge, ShutdownSignal};
pub use config::{AppConfig, ConfigError, TransportKind};
pub use error::SdkError;
pub use logging::{DEFAULT_LOG_DIRECTIVE, init_logger, try_init_logger};

// 常用类型
pub use ldm_driver::{DeviceBuilder, DeviceEvent, DriverError, LaserDevice, SessionState};
pub use ldm_processing::ProcessedSample;
pub use ldm_protocol::{MeasureSpeed, Measurement};
pub use ldm_transport::TransportTarget;
