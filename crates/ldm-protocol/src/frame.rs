//! 响应帧定义与负载解析
//!
//! 帧格式：`[AA][addr][reg_hi][reg_lo][cnt_hi][cnt_lo][payload: cnt * 2][chk]`

use crate::constants::*;
use crate::{ProtocolError, Register, VersionKind};
use bytes::Bytes;
use std::fmt;

/// 帧类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameKind {
    Ack,
    Nack,
    Measurement,
    Status,
    Info,
}

/// 测量结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measurement {
    /// 距离（毫米）
    pub distance_mm: u32,
    /// 归一化信号质量（0-100）
    pub quality: u8,
    /// 原始信号质量
    pub raw_quality: u16,
}

impl Measurement {
    /// 从原始值构建，信号质量按满量程归一化
    pub fn from_raw(distance_mm: u32, raw_quality: u16) -> Self {
        Self {
            distance_mm,
            quality: normalize_quality(raw_quality),
            raw_quality,
        }
    }

    pub fn distance_m(&self) -> f64 {
        f64::from(self.distance_mm) / 1000.0
    }
}

/// 信号质量归一化
///
/// 原始值不超过 100 时视为已是百分比；否则按 65535 满量程换算并四舍五入。
pub fn normalize_quality(raw: u16) -> u8 {
    if raw <= u16::from(QUALITY_MAX) {
        return raw as u8;
    }
    let scaled = (u32::from(raw) * u32::from(QUALITY_MAX) + QUALITY_RAW_FULL_SCALE / 2)
        / QUALITY_RAW_FULL_SCALE;
    scaled.min(u32::from(QUALITY_MAX)) as u8
}

/// 设备状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceStatus {
    Ok,
    MeasurementFailed,
    LaserMalfunction,
    TemperatureHigh,
    VoltageLow,
    SignalWeak,
    Unknown(u16),
}

impl DeviceStatus {
    pub fn from_code(code: u16) -> Self {
        match code {
            0x00 => Self::Ok,
            0x01 => Self::MeasurementFailed,
            0x02 => Self::LaserMalfunction,
            0x03 => Self::TemperatureHigh,
            0x04 => Self::VoltageLow,
            0x05 => Self::SignalWeak,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 0x00,
            Self::MeasurementFailed => 0x01,
            Self::LaserMalfunction => 0x02,
            Self::TemperatureHigh => 0x03,
            Self::VoltageLow => 0x04,
            Self::SignalWeak => 0x05,
            Self::Unknown(code) => code,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "OK - normal operation",
            Self::MeasurementFailed => "Error - measurement failed",
            Self::LaserMalfunction => "Error - laser malfunction",
            Self::TemperatureHigh => "Error - temperature too high",
            Self::VoltageLow => "Error - voltage too low",
            Self::SignalWeak => "Warning - signal quality low",
            Self::Unknown(_) => "Error - unknown status",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), self.code())
    }
}

/// 序列号（4 字节原始值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialNumber(pub [u8; SERIAL_PAYLOAD_LEN]);

impl SerialNumber {
    /// 全部为可打印 ASCII 时按文本显示
    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|b| (0x20..=0x7E).contains(b))
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_printable() {
            // 可打印字符一定是合法 UTF-8
            f.write_str(std::str::from_utf8(&self.0).unwrap_or_default())
        } else {
            f.write_str(&hex::encode_upper(self.0))
        }
    }
}

/// 解析后的负载
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseBody {
    /// 写命令应答（激光开关等），`value` 为回显的负载字
    Ack { value: u16 },
    /// 设备拒绝
    Nack { code: u16 },
    Measurement(Measurement),
    Status(DeviceStatus),
    Version { kind: VersionKind, value: u16 },
    Serial(SerialNumber),
    Voltage { millivolts: u32 },
}

/// 解码后的响应帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub address: u8,
    /// 原始寄存器地址（Nack 帧可能不是已知寄存器）
    pub register: u16,
    /// 原始负载字节
    pub payload: Bytes,
    pub body: ResponseBody,
}

impl ResponseFrame {
    /// 从地址、寄存器和负载解析
    ///
    /// # 错误
    ///
    /// - 未知寄存器：[`ProtocolError::UnknownRegister`]
    /// - 负载长度与寄存器不符：[`ProtocolError::InvalidPayload`]
    pub fn parse(address: u8, register: u16, payload: Bytes) -> Result<Self, ProtocolError> {
        let body = parse_body(address, register, &payload)?;
        Ok(Self {
            address,
            register,
            payload,
            body,
        })
    }

    pub fn kind(&self) -> FrameKind {
        match self.body {
            ResponseBody::Ack { .. } => FrameKind::Ack,
            ResponseBody::Nack { .. } => FrameKind::Nack,
            ResponseBody::Measurement(_) => FrameKind::Measurement,
            ResponseBody::Status(_) => FrameKind::Status,
            ResponseBody::Version { .. } | ResponseBody::Serial(_) | ResponseBody::Voltage { .. } => {
                FrameKind::Info
            },
        }
    }

    /// 已知寄存器（Nack 或未知地址返回 `None`）
    pub fn known_register(&self) -> Option<Register> {
        Register::try_from(self.register).ok()
    }

    pub fn measurement(&self) -> Option<Measurement> {
        match self.body {
            ResponseBody::Measurement(m) => Some(m),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<DeviceStatus> {
        match self.body {
            ResponseBody::Status(s) => Some(s),
            _ => None,
        }
    }

    /// 测量结果帧
    pub fn new_measurement(distance_mm: u32, raw_quality: u16) -> Self {
        let mut payload = Vec::with_capacity(MEASUREMENT_PAYLOAD_LEN);
        payload.extend_from_slice(&distance_mm.to_be_bytes());
        payload.extend_from_slice(&raw_quality.to_be_bytes());
        Self {
            address: ADDR_WRITE,
            register: Register::MeasurementResult.addr(),
            payload: Bytes::from(payload),
            body: ResponseBody::Measurement(Measurement::from_raw(distance_mm, raw_quality)),
        }
    }

    /// 状态帧
    pub fn new_status(status: DeviceStatus) -> Self {
        Self::word(
            ADDR_READ,
            Register::Status,
            status.code(),
            ResponseBody::Status(status),
        )
    }

    /// 版本帧
    pub fn new_version(kind: VersionKind, value: u16) -> Self {
        Self::word(
            ADDR_READ,
            kind.register(),
            value,
            ResponseBody::Version { kind, value },
        )
    }

    /// 序列号帧
    pub fn new_serial(serial: SerialNumber) -> Self {
        Self {
            address: ADDR_READ,
            register: Register::SerialNumber.addr(),
            payload: Bytes::copy_from_slice(&serial.0),
            body: ResponseBody::Serial(serial),
        }
    }

    /// 电压帧（BCD 编码毫伏，最多 4 位十进制）
    pub fn new_voltage(millivolts: u32) -> Self {
        let mv = millivolts.min(9999);
        let digits = [mv / 1000, (mv / 100) % 10, (mv / 10) % 10, mv % 10];
        let b1 = ((digits[0] << 4) | digits[1]) as u8;
        let b2 = ((digits[2] << 4) | digits[3]) as u8;
        Self {
            address: ADDR_READ,
            register: Register::InputVoltage.addr(),
            payload: Bytes::copy_from_slice(&[b1, b2]),
            body: ResponseBody::Voltage { millivolts: mv },
        }
    }

    /// 写命令应答帧（回显负载字）
    pub fn new_ack(register: Register, value: u16) -> Self {
        Self::word(ADDR_WRITE, register, value, ResponseBody::Ack { value })
    }

    /// 拒绝帧
    pub fn new_nack(register: u16, code: u16) -> Self {
        Self {
            address: ADDR_NACK,
            register,
            payload: Bytes::copy_from_slice(&code.to_be_bytes()),
            body: ResponseBody::Nack { code },
        }
    }

    fn word(address: u8, register: Register, value: u16, body: ResponseBody) -> Self {
        Self {
            address,
            register: register.addr(),
            payload: Bytes::copy_from_slice(&value.to_be_bytes()),
            body,
        }
    }
}

impl fmt::Display for ResponseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.body {
            ResponseBody::Ack { value } => {
                write!(f, "ACK reg=0x{:04X} value=0x{:04X}", self.register, value)
            },
            ResponseBody::Nack { code } => {
                write!(f, "NACK reg=0x{:04X} code=0x{:04X}", self.register, code)
            },
            ResponseBody::Measurement(m) => write!(
                f,
                "MEASUREMENT {} mm quality={} (raw {})",
                m.distance_mm, m.quality, m.raw_quality
            ),
            ResponseBody::Status(s) => write!(f, "STATUS {s}"),
            ResponseBody::Version { kind, value } => write!(f, "VERSION {kind:?} {value}"),
            ResponseBody::Serial(s) => write!(f, "SERIAL {s}"),
            ResponseBody::Voltage { millivolts } => {
                write!(f, "VOLTAGE {:.3} V", f64::from(millivolts) / 1000.0)
            },
        }
    }
}

fn parse_body(address: u8, register: u16, payload: &[u8]) -> Result<ResponseBody, ProtocolError> {
    if address == ADDR_NACK {
        let code = match payload {
            [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
            _ => 0,
        };
        return Ok(ResponseBody::Nack { code });
    }

    let reg = Register::try_from(register).map_err(|_| ProtocolError::UnknownRegister { register })?;

    let expect = |expected: usize| -> Result<(), ProtocolError> {
        if payload.len() == expected {
            Ok(())
        } else {
            Err(ProtocolError::InvalidPayload {
                register,
                expected,
                actual: payload.len(),
            })
        }
    };
    let word = || u16::from_be_bytes([payload[0], payload[1]]);

    match reg {
        Register::MeasurementResult => {
            expect(MEASUREMENT_PAYLOAD_LEN)?;
            let distance = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
            let raw_quality = u16::from_be_bytes([payload[4], payload[5]]);
            Ok(ResponseBody::Measurement(Measurement::from_raw(
                distance,
                raw_quality,
            )))
        },
        Register::Status => {
            expect(WORD_SIZE)?;
            Ok(ResponseBody::Status(DeviceStatus::from_code(word())))
        },
        Register::HardwareVersion => {
            expect(WORD_SIZE)?;
            Ok(ResponseBody::Version {
                kind: VersionKind::Hardware,
                value: word(),
            })
        },
        Register::SoftwareVersion => {
            expect(WORD_SIZE)?;
            Ok(ResponseBody::Version {
                kind: VersionKind::Software,
                value: word(),
            })
        },
        Register::SerialNumber => {
            expect(SERIAL_PAYLOAD_LEN)?;
            Ok(ResponseBody::Serial(SerialNumber([
                payload[0], payload[1], payload[2], payload[3],
            ])))
        },
        Register::InputVoltage => {
            expect(WORD_SIZE)?;
            Ok(ResponseBody::Voltage {
                millivolts: decode_bcd_millivolts(payload[0], payload[1]),
            })
        },
        Register::Laser | Register::Measure => {
            expect(WORD_SIZE)?;
            Ok(ResponseBody::Ack { value: word() })
        },
    }
}

/// BCD 毫伏解码；任一半字节超过 9 时按大端整数处理
fn decode_bcd_millivolts(b1: u8, b2: u8) -> u32 {
    let nibbles = [b1 >> 4, b1 & 0x0F, b2 >> 4, b2 & 0x0F];
    if nibbles.iter().all(|n| *n <= 9) {
        nibbles.iter().fold(0u32, |acc, n| acc * 10 + u32::from(*n))
    } else {
        u32::from(u16::from_be_bytes([b1, b2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_normalization() {
        assert_eq!(normalize_quality(80), 80);
        assert_eq!(normalize_quality(100), 100);
        assert_eq!(normalize_quality(65535), 100);
        // 32768 / 65535 * 100 = 50.0008 → 50
        assert_eq!(normalize_quality(32768), 50);
        assert_eq!(normalize_quality(101), 0);
    }

    #[test]
    fn test_bcd_voltage() {
        assert_eq!(decode_bcd_millivolts(0x32, 0x87), 3287);
        // 非 BCD：0x0C 0xD8 = 3288
        assert_eq!(decode_bcd_millivolts(0x0C, 0xD8), 3288);
    }

    #[test]
    fn test_serial_display() {
        assert_eq!(SerialNumber(*b"A1B2").to_string(), "A1B2");
        assert_eq!(SerialNumber([0x00, 0x12, 0xAB, 0xFF]).to_string(), "0012ABFF");
    }

    #[test]
    fn test_parse_rejects_wrong_payload_length() {
        let err = ResponseFrame::parse(ADDR_READ, 0x0000, Bytes::from_static(&[0x00])).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidPayload {
                register: 0x0000,
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_parse_unknown_register() {
        let err = ResponseFrame::parse(ADDR_READ, 0x4242, Bytes::from_static(&[0, 0])).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnknownRegister { register: 0x4242 }
        ));
    }

    #[test]
    fn test_status_description() {
        let status = DeviceStatus::from_code(4);
        assert_eq!(status, DeviceStatus::VoltageLow);
        assert!(!status.is_ok());
        assert_eq!(DeviceStatus::from_code(0x00FF), DeviceStatus::Unknown(0xFF));
    }

    #[test]
    fn test_frame_kind() {
        assert_eq!(ResponseFrame::new_measurement(1, 2).kind(), FrameKind::Measurement);
        assert_eq!(ResponseFrame::new_voltage(3300).kind(), FrameKind::Info);
        assert_eq!(ResponseFrame::new_ack(Register::Laser, 1).kind(), FrameKind::Ack);
        assert_eq!(ResponseFrame::new_nack(0x0020, 3).kind(), FrameKind::Nack);
    }
}
