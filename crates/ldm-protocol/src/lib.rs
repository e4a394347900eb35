//! # LDM Protocol
//!
//! Meskernel LDJ100-755 激光测距传感器串口协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 帧头、地址、长度常量
//! - `register`: 寄存器地址
//! - `command`: 出站命令与操作码
//! - `frame`: 响应帧与负载解析
//! - `codec`: 可插拔编解码器（[`FrameCodec`] / [`MeskernelCodec`]）
//! - `sample`: 测量样本
//!
//! ## 字节序
//!
//! 寄存器、计数和负载均为大端字节序。

pub mod codec;
pub mod command;
pub mod constants;
mod error;
pub mod frame;
pub mod register;
pub mod sample;

pub use codec::{CodecConfig, FrameCodec, Frames, MeskernelCodec, checksum};
pub use command::{Command, MeasureSpeed, Opcode, VersionKind};
pub use error::ProtocolError;
pub use frame::{
    DeviceStatus, FrameKind, Measurement, ResponseBody, ResponseFrame, SerialNumber,
    normalize_quality,
};
pub use register::Register;
pub use sample::MeasurementSample;
