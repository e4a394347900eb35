//! 命令定义
//!
//! 每个 [`Command`] 对应设备命令集中的一个操作码，携带可选负载、
//! 关联标签（期望的响应寄存器）以及最大等待时间。

use crate::Register;
use crate::constants::DEFAULT_COMMAND_TIMEOUT;
use std::fmt;
use std::time::Duration;

/// 测量速度档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MeasureSpeed {
    /// 自动
    #[default]
    Auto,
    /// 低速（高精度）
    Slow,
    /// 高速
    Fast,
}

impl MeasureSpeed {
    pub const ALL: [MeasureSpeed; 3] = [Self::Auto, Self::Slow, Self::Fast];

    /// 单次测量模式字
    pub fn single_mode_word(self) -> u16 {
        match self {
            Self::Auto => 0x0000,
            Self::Slow => 0x0001,
            Self::Fast => 0x0002,
        }
    }

    /// 连续测量模式字
    pub fn continuous_mode_word(self) -> u16 {
        match self {
            Self::Auto => 0x0004,
            Self::Slow => 0x0005,
            Self::Fast => 0x0006,
        }
    }
}

/// 版本类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VersionKind {
    Hardware,
    Software,
}

impl VersionKind {
    pub fn register(self) -> Register {
        match self {
            Self::Hardware => Register::HardwareVersion,
            Self::Software => Register::SoftwareVersion,
        }
    }
}

/// 操作码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    LaserOn,
    LaserOff,
    SingleMeasure(MeasureSpeed),
    ContinuousStart(MeasureSpeed),
    ContinuousStop,
    ReadStatus,
    ReadVersion(VersionKind),
    ReadSerial,
    ReadVoltage,
    ReadLastMeasurement,
}

impl Opcode {
    /// 全部操作码（用于请求识别）
    pub const ALL: [Opcode; 15] = [
        Opcode::LaserOn,
        Opcode::LaserOff,
        Opcode::SingleMeasure(MeasureSpeed::Auto),
        Opcode::SingleMeasure(MeasureSpeed::Slow),
        Opcode::SingleMeasure(MeasureSpeed::Fast),
        Opcode::ContinuousStart(MeasureSpeed::Auto),
        Opcode::ContinuousStart(MeasureSpeed::Slow),
        Opcode::ContinuousStart(MeasureSpeed::Fast),
        Opcode::ContinuousStop,
        Opcode::ReadStatus,
        Opcode::ReadVersion(VersionKind::Hardware),
        Opcode::ReadVersion(VersionKind::Software),
        Opcode::ReadSerial,
        Opcode::ReadVoltage,
        Opcode::ReadLastMeasurement,
    ];

    /// 请求写入/读取的寄存器；`ContinuousStop` 是裸字节，没有寄存器
    pub fn register(self) -> Option<Register> {
        match self {
            Self::LaserOn | Self::LaserOff => Some(Register::Laser),
            Self::SingleMeasure(_) | Self::ContinuousStart(_) => Some(Register::Measure),
            Self::ContinuousStop => None,
            Self::ReadStatus => Some(Register::Status),
            Self::ReadVersion(kind) => Some(kind.register()),
            Self::ReadSerial => Some(Register::SerialNumber),
            Self::ReadVoltage => Some(Register::InputVoltage),
            Self::ReadLastMeasurement => Some(Register::MeasurementResult),
        }
    }

    /// 写请求的负载字（读请求返回 `None`）
    pub fn payload(self) -> Option<u16> {
        match self {
            Self::LaserOn => Some(0x0001),
            Self::LaserOff => Some(0x0000),
            Self::SingleMeasure(speed) => Some(speed.single_mode_word()),
            Self::ContinuousStart(speed) => Some(speed.continuous_mode_word()),
            _ => None,
        }
    }

    /// 关联标签：期望的响应寄存器
    ///
    /// 测量类命令的应答是测量结果帧（寄存器 0x0022）；
    /// 连续测量的第一帧测量数据即视为启动应答。
    pub fn correlation(self) -> Option<Register> {
        match self {
            Self::SingleMeasure(_) | Self::ContinuousStart(_) => Some(Register::MeasurementResult),
            Self::ContinuousStop => None,
            other => other.register(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::LaserOn => "laser-on",
            Self::LaserOff => "laser-off",
            Self::SingleMeasure(_) => "single-measure",
            Self::ContinuousStart(_) => "continuous-start",
            Self::ContinuousStop => "continuous-stop",
            Self::ReadStatus => "read-status",
            Self::ReadVersion(VersionKind::Hardware) => "read-hardware-version",
            Self::ReadVersion(VersionKind::Software) => "read-software-version",
            Self::ReadSerial => "read-serial",
            Self::ReadVoltage => "read-voltage",
            Self::ReadLastMeasurement => "read-last-measurement",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 出站命令
///
/// # Example
///
/// ```rust
/// use ldm_protocol::{Command, MeasureSpeed, Opcode, Register};
/// use std::time::Duration;
///
/// let cmd = Command::new(Opcode::SingleMeasure(MeasureSpeed::Auto))
///     .with_max_wait(Duration::from_secs(5));
/// assert_eq!(cmd.correlation(), Some(Register::MeasurementResult));
/// assert_eq!(cmd.payload(), Some(0x0000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub opcode: Opcode,
    pub max_wait: Duration,
}

impl Command {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            max_wait: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn payload(&self) -> Option<u16> {
        self.opcode.payload()
    }

    pub fn correlation(&self) -> Option<Register> {
        self.opcode.correlation()
    }

    /// 是否等待设备应答
    pub fn expects_response(&self) -> bool {
        self.correlation().is_some()
    }

    pub fn laser_on() -> Self {
        Self::new(Opcode::LaserOn)
    }

    pub fn laser_off() -> Self {
        Self::new(Opcode::LaserOff)
    }

    pub fn single_measure(speed: MeasureSpeed) -> Self {
        Self::new(Opcode::SingleMeasure(speed))
    }

    pub fn continuous_start(speed: MeasureSpeed) -> Self {
        Self::new(Opcode::ContinuousStart(speed))
    }

    pub fn continuous_stop() -> Self {
        Self::new(Opcode::ContinuousStop)
    }

    pub fn read_status() -> Self {
        Self::new(Opcode::ReadStatus)
    }

    pub fn read_version(kind: VersionKind) -> Self {
        Self::new(Opcode::ReadVersion(kind))
    }

    pub fn read_serial() -> Self {
        Self::new(Opcode::ReadSerial)
    }

    pub fn read_voltage() -> Self {
        Self::new(Opcode::ReadVoltage)
    }

    pub fn read_last_measurement() -> Self {
        Self::new(Opcode::ReadLastMeasurement)
    }
}

impl From<Opcode> for Command {
    fn from(opcode: Opcode) -> Self {
        Self::new(opcode)
    }
}
