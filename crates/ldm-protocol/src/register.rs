//! 寄存器定义

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 传感器寄存器地址（大端 u16）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum Register {
    /// 设备状态码
    Status = 0x0000,
    /// 输入电压（BCD 毫伏）
    InputVoltage = 0x0006,
    /// 硬件版本
    HardwareVersion = 0x000A,
    /// 软件版本
    SoftwareVersion = 0x000C,
    /// 序列号（4 字节）
    SerialNumber = 0x000E,
    /// 测量控制（写入测量模式）
    Measure = 0x0020,
    /// 测量结果（距离 + 信号质量）
    MeasurementResult = 0x0022,
    /// 激光开关
    Laser = 0x01BE,
}

impl Register {
    /// 原始寄存器地址
    pub fn addr(self) -> u16 {
        self.into()
    }

    /// 大端字节
    pub fn to_be_bytes(self) -> [u8; 2] {
        self.addr().to_be_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_round_trip() {
        assert_eq!(Register::try_from(0x01BE), Ok(Register::Laser));
        assert_eq!(Register::MeasurementResult.to_be_bytes(), [0x00, 0x22]);
        assert!(Register::try_from(0x1234).is_err());
    }
}
