//! 驱动层错误类型定义

use crate::state::SessionState;
use ldm_protocol::{Opcode, ProtocolError};
use ldm_transport::TransportError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输无法打开（ConnectionError）
    #[error("Connection failed: {0}")]
    Connection(#[source] TransportError),

    /// 会话中途断开（ConnectionLostError）
    ///
    /// 所有等待中的请求在断线时立即以此错误结束。
    #[error("Connection lost")]
    ConnectionLost,

    /// 重试耗尽仍未收到匹配的响应（TimeoutError）
    #[error("No response to {opcode} after {attempts} attempt(s)")]
    Timeout { opcode: Opcode, attempts: u32 },

    /// 响应非法或被设备拒绝
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 配置非法（ConfigurationError）
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// 当前会话状态不允许该操作
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// 会话中的非致命传输错误（如写超时）
    #[error("Transport error: {0}")]
    Transport(#[source] TransportError),

    /// 命令不产生响应，应使用 `send_no_reply`
    #[error("{0} does not produce a response")]
    NoResponseExpected(Opcode),

    /// 命令通道已关闭（IO 线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 命令通道已满
    #[error("Command channel full")]
    ChannelFull,

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}

impl DriverError {
    /// 是否意味着会话已结束
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost | Self::ChannelClosed)
    }
}
