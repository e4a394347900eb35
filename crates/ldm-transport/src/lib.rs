//! # LDM Transport Layer
//!
//! 字节级双工传输抽象，提供统一的 [`Transport`] 接口：
//!
//! - [`SerialTransport`]：串口（无人值守 MQTT 模式）
//! - [`BluetoothTransport`]：蓝牙 RFCOMM（交互模式）
//! - `mock`：内存链路（测试）
//!
//! 所有实现遵循相同的时序与错误语义：`read_available` 最多阻塞一个轮询间隔，
//! 无数据时返回 [`TransportError::Timeout`]；链路中断返回致命错误（[`TransportError::is_fatal`]）。
//! `close()` 幂等，且在 `Drop` 时自动执行。

use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod bluetooth;
#[cfg(feature = "serial")]
pub mod serial;
mod target;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use bluetooth::BluetoothTransport;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;
pub use target::{
    BluetoothAddress, DEFAULT_BAUD_RATE, DEFAULT_RFCOMM_CHANNEL, DEFAULT_SERIAL_PORT,
    TransportTarget,
};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open {target}: {message}")]
    Connection { target: String, message: String },
    #[error("Invalid transport configuration: {0}")]
    InvalidConfig(String),
    #[error("Read timeout")]
    Timeout,
    #[error("Connection closed by peer")]
    Disconnected,
    #[error("Transport closed")]
    Closed,
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl TransportError {
    /// 是否意味着链路已不可用（需要结束会话）
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Disconnected | Self::Closed => true,
            Self::Io(e) => !matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ),
            Self::Connection { .. }
            | Self::InvalidConfig(_)
            | Self::Timeout
            | Self::Unsupported(_) => false,
        }
    }
}

/// 传输选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    /// `read_available` 的最大阻塞时间
    pub poll_interval: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// 字节级双工传输
///
/// 传输由协议引擎独占；实现必须是 `Send`，以便移交给 IO 线程。
pub trait Transport: Send {
    /// 会话标识
    fn target(&self) -> &TransportTarget;

    /// 写入全部字节
    ///
    /// # 错误
    /// 断线（BrokenPipe 等）或写超时返回 `TransportError::Io` / `Disconnected`
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// 读取当前可用的字节（有界阻塞）
    ///
    /// 返回 `Ok(n)`（`n > 0`），或在一个轮询间隔内无数据时返回 `Err(TransportError::Timeout)`。
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    fn set_poll_interval(&mut self, interval: Duration);

    fn poll_interval(&self) -> Duration;

    /// 关闭底层句柄（幂等）
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// 传输工厂：在会话创建时按目标选择具体实现
pub trait TransportOpener: Send + Sync {
    fn open(
        &self,
        target: &TransportTarget,
        options: &TransportOptions,
    ) -> Result<Box<dyn Transport>, TransportError>;
}

impl<T: TransportOpener + ?Sized> TransportOpener for Arc<T> {
    fn open(
        &self,
        target: &TransportTarget,
        options: &TransportOptions,
    ) -> Result<Box<dyn Transport>, TransportError> {
        (**self).open(target, options)
    }
}

/// 打开真实设备的传输工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTransportOpener;

impl TransportOpener for SystemTransportOpener {
    fn open(
        &self,
        target: &TransportTarget,
        options: &TransportOptions,
    ) -> Result<Box<dyn Transport>, TransportError> {
        open_transport(target, options)
    }
}

/// 按目标打开传输
///
/// # 错误
/// - `TransportError::InvalidConfig`: 参数非法
/// - `TransportError::Connection`: 打开失败
/// - `TransportError::Unsupported`: 当前平台或构建不支持该传输
pub fn open_transport(
    target: &TransportTarget,
    options: &TransportOptions,
) -> Result<Box<dyn Transport>, TransportError> {
    target.validate()?;
    match target {
        #[cfg(feature = "serial")]
        TransportTarget::Serial { port, baud_rate } => {
            Ok(Box::new(SerialTransport::open(port, *baud_rate, options)?))
        },
        #[cfg(not(feature = "serial"))]
        TransportTarget::Serial { .. } => Err(TransportError::Unsupported(
            "serial transport disabled (enable the `serial` feature)".to_string(),
        )),
        TransportTarget::Bluetooth { address, channel } => Ok(Box::new(
            BluetoothTransport::connect(*address, *channel, options)?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(TransportError::Disconnected.is_fatal());
        assert!(TransportError::Closed.is_fatal());
        assert!(TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_fatal());
        assert!(!TransportError::Io(io::Error::from(io::ErrorKind::TimedOut)).is_fatal());
        assert!(!TransportError::Timeout.is_fatal());
    }

    #[test]
    fn test_open_rejects_invalid_target() {
        let err = open_transport(&TransportTarget::serial("", 0), &TransportOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::InvalidConfig(_)));
    }
}
