//! 设备信息

use ldm_protocol::{DeviceStatus, SerialNumber};
use std::fmt;

/// 一次性读取的设备信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub status: DeviceStatus,
    pub hardware_version: u16,
    pub software_version: u16,
    pub serial: SerialNumber,
    /// 输入电压（毫伏）
    pub voltage_mv: u32,
}

impl DeviceInfo {
    pub fn voltage_v(&self) -> f64 {
        f64::from(self.voltage_mv) / 1000.0
    }
}

/// 版本字按十六进制显示（`0x0102`）
pub fn format_version(version: u16) -> String {
    format!("0x{version:04X}")
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Status:           {}", self.status)?;
        writeln!(f, "Hardware version: {}", format_version(self.hardware_version))?;
        writeln!(f, "Software version: {}", format_version(self.software_version))?;
        writeln!(f, "Serial number:    {}", self.serial)?;
        write!(f, "Input voltage:    {:.3} V", self.voltage_v())
    }
}
