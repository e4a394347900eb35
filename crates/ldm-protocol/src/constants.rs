//! 协议常量定义
//!
//! Meskernel LDJ100-755 串口协议的帧头、地址、寄存器与帧长度。

use std::time::Duration;

/// 帧头
pub const FRAME_HEADER: u8 = 0xAA;

/// 写请求地址（也是测量结果帧的地址）
pub const ADDR_WRITE: u8 = 0x00;

/// 读请求地址
pub const ADDR_READ: u8 = 0x80;

/// 设备拒绝帧地址（Nack）
///
/// 手册未给出拒绝帧格式，这里约定一个独立地址；解码器将其识别为 [`FrameKind::Nack`](crate::FrameKind::Nack)。
pub const ADDR_NACK: u8 = 0xEE;

/// 退出连续测量：单字节 ASCII 'X'，设备不回复
pub const EXIT_CONTINUOUS_BYTE: u8 = b'X';

/// 读请求长度：header + addr + reg(2) + chk
pub const READ_REQUEST_LEN: usize = 5;

/// 帧固定开销：header + addr + reg(2) + count(2) + chk
pub const FRAME_OVERHEAD: usize = 7;

/// 计数字段之前的字节数（header + addr + reg(2) + count(2)）
pub const FRAME_PREFIX_LEN: usize = 6;

/// 单个数据字的字节数
pub const WORD_SIZE: usize = 2;

/// 默认允许的最大负载字数（超过视为帧损坏，触发重同步）
pub const DEFAULT_MAX_PAYLOAD_WORDS: u16 = 8;

/// 测量结果帧总长度
pub const MEASUREMENT_FRAME_LEN: usize = 13;

/// 测量结果负载长度：distance(4) + quality(2)
pub const MEASUREMENT_PAYLOAD_LEN: usize = 6;

/// 序列号负载长度
pub const SERIAL_PAYLOAD_LEN: usize = 4;

/// 信号质量原始值的满量程
pub const QUALITY_RAW_FULL_SCALE: u32 = 65535;

/// 信号质量归一化后的上限（百分比）
pub const QUALITY_MAX: u8 = 100;

/// 命令默认最大等待时间
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);
