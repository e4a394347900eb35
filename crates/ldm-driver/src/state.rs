//! 会话状态机
//!
//! ```text
//! Disconnected → Connecting → ConnectedIdle ⇄ Measuring
//!        ↑____________(传输故障 / disconnect)____________|
//! ```
//!
//! 状态由 API 调用线程与 IO 线程共同修改，所有转换都经过 [`AtomicSessionState`]
//! 的原子操作完成，不存在"读到一半"的状态。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum SessionState {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    ConnectedIdle = 2,
    Measuring = 3,
}

impl SessionState {
    /// 从 u8 转换，无效值视为 Disconnected
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::ConnectedIdle,
            3 => Self::Measuring,
            _ => Self::Disconnected,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 是否允许发送普通命令（状态 ≥ ConnectedIdle）
    pub fn is_connected(self) -> bool {
        self >= Self::ConnectedIdle
    }

    pub fn is_measuring(self) -> bool {
        self == Self::Measuring
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::ConnectedIdle => "connected-idle",
            Self::Measuring => "measuring",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 原子会话状态
///
/// 只提供整体替换与比较交换两种修改方式。
#[derive(Debug, Default)]
pub struct AtomicSessionState {
    inner: AtomicU8,
}

impl AtomicSessionState {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// 无条件替换，返回旧状态
    pub fn swap(&self, state: SessionState) -> SessionState {
        SessionState::from_u8(self.inner.swap(state.as_u8(), Ordering::AcqRel))
    }

    /// 仅当当前状态为 `from` 时切换到 `to`
    ///
    /// 失败时返回实际状态。
    pub fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SessionState> {
        self.inner
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(SessionState::from_u8)
    }
}
