//! 蓝牙 RFCOMM 传输实现
//!
//! Linux 下使用 BlueZ 的 RFCOMM socket（`AF_BLUETOOTH` / `BTPROTO_RFCOMM`），
//! 读操作通过 `nix::poll` 实现有界阻塞，与串口传输的超时语义一致。
//!
//! ## 限制
//!
//! - **仅限 Linux 平台**：其他平台 `connect` 返回 [`TransportError::Unsupported`]
//! - **配对**：设备配对由系统蓝牙工具完成，不在应用层处理

use crate::{BluetoothAddress, Transport, TransportError, TransportOptions, TransportTarget};
use std::time::Duration;

#[cfg(target_os = "linux")]
mod rfcomm;

/// 蓝牙 RFCOMM 传输
pub struct BluetoothTransport {
    #[cfg(target_os = "linux")]
    socket: Option<rfcomm::RfcommSocket>,
    target: TransportTarget,
    poll_interval: Duration,
}

impl BluetoothTransport {
    /// 连接到蓝牙设备
    ///
    /// # 参数
    /// - `address`: 设备地址
    /// - `channel`: RFCOMM 通道（SPP 通常为 1）
    ///
    /// # 错误
    /// - `TransportError::InvalidConfig`: 通道超出范围
    /// - `TransportError::Connection`: 连接失败（设备不在范围内、未配对、被拒绝）
    /// - `TransportError::Unsupported`: 非 Linux 平台
    #[cfg(target_os = "linux")]
    pub fn connect(
        address: BluetoothAddress,
        channel: u8,
        options: &TransportOptions,
    ) -> Result<Self, TransportError> {
        let target = TransportTarget::bluetooth(address, channel);
        target.validate()?;
        let socket =
            rfcomm::RfcommSocket::connect(address, channel).map_err(|e| TransportError::Connection {
                target: target.to_string(),
                message: e.to_string(),
            })?;
        tracing::debug!("RFCOMM connected to {}", target);
        Ok(Self {
            socket: Some(socket),
            target,
            poll_interval: options.poll_interval,
        })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn connect(
        address: BluetoothAddress,
        channel: u8,
        _options: &TransportOptions,
    ) -> Result<Self, TransportError> {
        TransportTarget::bluetooth(address, channel).validate()?;
        Err(TransportError::Unsupported(
            "bluetooth RFCOMM transport is only available on Linux".to_string(),
        ))
    }
}

#[cfg(target_os = "linux")]
impl Transport for BluetoothTransport {
    fn target(&self) -> &TransportTarget {
        &self.target
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::Closed)?;
        socket.send_all(bytes)?;
        tracing::trace!("RFCOMM TX {} bytes", bytes.len());
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::Closed)?;
        socket.recv_timeout(buf, self.poll_interval)
    }

    fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            tracing::debug!("RFCOMM connection {} closed", self.target);
        }
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }
}

#[cfg(not(target_os = "linux"))]
impl Transport for BluetoothTransport {
    fn target(&self) -> &TransportTarget {
        &self.target
    }

    fn write(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::Closed)
    }

    fn read_available(&mut self, _buf: &mut [u8]) -> Result<usize, TransportError> {
        Err(TransportError::Closed)
    }

    fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn close(&mut self) {}

    fn is_open(&self) -> bool {
        false
    }
}

impl Drop for BluetoothTransport {
    fn drop(&mut self) {
        self.close();
    }
}
