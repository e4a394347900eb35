//! 传输目标（会话标识）

use crate::TransportError;
use std::fmt;
use std::str::FromStr;

/// 默认串口路径
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";

/// 默认波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 默认 RFCOMM 通道（SPP）
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// 蓝牙设备地址（`AA:BB:CC:DD:EE:FF`，按书写顺序存储）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BluetoothAddress(pub [u8; 6]);

impl FromStr for BluetoothAddress {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidConfig(format!("invalid bluetooth address: '{s}'"));
        let mut bytes = [0u8; 6];
        let mut parts = s.trim().split(':');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for BluetoothAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// 传输目标
///
/// 串口目标由端口路径 + 波特率标识，蓝牙目标由设备地址 + RFCOMM 通道标识。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportTarget {
    Serial { port: String, baud_rate: u32 },
    Bluetooth { address: BluetoothAddress, channel: u8 },
}

impl TransportTarget {
    pub fn serial(port: impl Into<String>, baud_rate: u32) -> Self {
        Self::Serial {
            port: port.into(),
            baud_rate,
        }
    }

    pub fn bluetooth(address: BluetoothAddress, channel: u8) -> Self {
        Self::Bluetooth { address, channel }
    }

    /// 校验参数
    ///
    /// # 错误
    ///
    /// `TransportError::InvalidConfig`：空端口、波特率为 0、RFCOMM 通道超出 1-30
    pub fn validate(&self) -> Result<(), TransportError> {
        match self {
            Self::Serial { port, baud_rate } => {
                if port.trim().is_empty() {
                    return Err(TransportError::InvalidConfig(
                        "serial port path is empty".to_string(),
                    ));
                }
                if *baud_rate == 0 {
                    return Err(TransportError::InvalidConfig(
                        "baud rate must be greater than 0".to_string(),
                    ));
                }
            },
            Self::Bluetooth { channel, .. } => {
                if !(1..=30).contains(channel) {
                    return Err(TransportError::InvalidConfig(format!(
                        "RFCOMM channel {channel} out of range 1-30"
                    )));
                }
            },
        }
        Ok(())
    }
}

impl Default for TransportTarget {
    fn default() -> Self {
        Self::serial(DEFAULT_SERIAL_PORT, DEFAULT_BAUD_RATE)
    }
}

impl fmt::Display for TransportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { port, baud_rate } => write!(f, "serial:{port}@{baud_rate}"),
            Self::Bluetooth { address, channel } => write!(f, "bluetooth:{address}#{channel}"),
        }
    }
}
