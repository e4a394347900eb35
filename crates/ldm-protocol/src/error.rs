use thiserror::Error;

/// 协议层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Checksum mismatch on register 0x{register:04X}: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch {
        register: u16,
        expected: u8,
        actual: u8,
    },

    #[error("Payload too long: {count} words (max {max})")]
    PayloadTooLong { count: u16, max: u16 },

    #[error("Unknown register: 0x{register:04X}")]
    UnknownRegister { register: u16 },

    #[error("Invalid payload for register 0x{register:04X}: expected {expected} bytes, got {actual}")]
    InvalidPayload {
        register: u16,
        expected: usize,
        actual: usize,
    },

    #[error("Command rejected by device on register 0x{register:04X} (code 0x{code:04X})")]
    Rejected { register: u16, code: u16 },

    #[error("Unexpected {kind} response on register 0x{register:04X}")]
    UnexpectedResponse { kind: String, register: u16 },
}

impl ProtocolError {
    /// 错误关联的寄存器（用于把解析失败归属到等待中的请求）
    ///
    /// 校验和错误的寄存器字段不可信，返回 `None`。
    pub fn register(&self) -> Option<u16> {
        match self {
            Self::InvalidPayload { register, .. }
            | Self::UnknownRegister { register }
            | Self::Rejected { register, .. }
            | Self::UnexpectedResponse { register, .. } => Some(*register),
            Self::ChecksumMismatch { .. } | Self::PayloadTooLong { .. } => None,
        }
    }

    /// 是否为帧损坏（需要重同步）
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. } | Self::PayloadTooLong { .. }
        )
    }
}
