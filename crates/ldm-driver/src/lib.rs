//! # LDM Driver
//!
//! Meskernel 激光测距传感器的命令协议引擎：
//!
//! - 每个打开的传输由一个 IO 线程独占（读取、解码、写出）
//! - 调用方通过会合表等待关联响应，超时有限次重试
//! - 会话状态机：Disconnected → Connecting → ConnectedIdle ⇄ Measuring
//! - 连续测量帧直接送入 Processing Pipeline 的有界队列
//! - 钩子系统：通信日志与录制
//!
//! # 使用示例
//!
//! ```no_run
//! use ldm_driver::LaserDevice;
//! use ldm_protocol::MeasureSpeed;
//! use ldm_transport::TransportTarget;
//!
//! let device = LaserDevice::builder().build()?;
//! device.connect(TransportTarget::serial("/dev/ttyUSB0", 115_200))?;
//! let m = device.measure_once(MeasureSpeed::Auto)?;
//! println!("{} mm (quality {})", m.distance_mm, m.quality);
//! device.disconnect();
//! # Ok::<(), ldm_driver::DriverError>(())
//! ```

mod builder;
mod command;
mod device;
mod error;
pub mod events;
pub mod heartbeat;
pub mod hooks;
mod info;
pub mod metrics;
mod pending;
mod pipeline;
pub mod recording;
pub mod state;

pub use builder::DeviceBuilder;
pub use device::{CodecFactory, DeviceConfig, LaserDevice, MAX_RETRIES, meskernel_codec};
pub use error::DriverError;
pub use events::{DEFAULT_EVENT_CAPACITY, DeviceEvent};
pub use heartbeat::ConnectionMonitor;
pub use hooks::{FrameObserver, HookManager};
pub use info::{DeviceInfo, format_version};
pub use metrics::{DeviceMetrics, MetricsSnapshot};
pub use recording::{TrafficRecord, TrafficRecorder};
pub use state::{AtomicSessionState, SessionState};
