//! 串口传输实现
//!
//! 基于 `serialport` crate。读超时即轮询间隔：`read_available` 最多阻塞一个轮询间隔，
//! 超时返回 [`TransportError::Timeout`]。

use crate::{Transport, TransportError, TransportOptions, TransportTarget};
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// 串口传输
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    target: TransportTarget,
    poll_interval: Duration,
}

impl SerialTransport {
    /// 打开串口
    ///
    /// # 参数
    /// - `port`: 串口路径（如 `/dev/ttyUSB0`）
    /// - `baud_rate`: 波特率
    /// - `options`: 轮询间隔等选项
    ///
    /// # 错误
    /// - `TransportError::InvalidConfig`: 参数非法
    /// - `TransportError::Connection`: 串口无法打开（不存在、权限不足、被占用）
    pub fn open(
        port: &str,
        baud_rate: u32,
        options: &TransportOptions,
    ) -> Result<Self, TransportError> {
        let target = TransportTarget::serial(port, baud_rate);
        target.validate()?;

        let handle = serialport::new(port, baud_rate)
            .timeout(options.poll_interval)
            .open()
            .map_err(|e| TransportError::Connection {
                target: target.to_string(),
                message: e.to_string(),
            })?;

        // 丢弃打开前残留的字节（例如上次会话遗留的连续测量数据）
        if let Err(e) = handle.clear(ClearBuffer::Input) {
            warn!("Failed to clear input buffer on {}: {}", port, e);
        }

        debug!("Serial port {} opened at {} baud", port, baud_rate);
        Ok(Self {
            port: Some(handle),
            target,
            poll_interval: options.poll_interval,
        })
    }

    fn handle(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for SerialTransport {
    fn target(&self) -> &TransportTarget {
        &self.target
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = self.handle()?;
        port.write_all(bytes)?;
        port.flush()?;
        trace!("serial TX {} bytes", bytes.len());
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let port = self.handle()?;
        match port.read(buf) {
            Ok(0) => Err(TransportError::Timeout),
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Err(TransportError::Timeout)
            },
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
        if let Some(port) = self.port.as_mut()
            && let Err(e) = port.set_timeout(interval)
        {
            warn!("Failed to set serial timeout: {}", e);
        }
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("Serial port {} closed", self.target);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}
