//! 会话事件
//!
//! IO 线程是唯一观察传输的一方，连接变化、未匹配帧、解码错误都以
//! [`DeviceEvent`] 形式发布到有界通道。通道满时丢弃事件并计数，IO 线程从不阻塞。

use crate::metrics::DeviceMetrics;
use crate::state::SessionState;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use ldm_protocol::{DeviceStatus, FrameKind};
use std::sync::Arc;
use tracing::trace;

/// 默认事件通道容量
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// 传输在会话中途失效
    ConnectionLost { reason: String },
    /// 未匹配任何请求的帧（已丢弃）
    Unsolicited { kind: FrameKind, register: u16 },
    /// 损坏或无法解析的帧
    FrameError(String),
    /// 设备主动上报或握手读取到的状态
    Status(DeviceStatus),
}

/// 事件发布端
#[derive(Clone)]
pub(crate) struct EventBus {
    tx: Sender<DeviceEvent>,
    rx: Receiver<DeviceEvent>,
    metrics: Arc<DeviceMetrics>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize, metrics: Arc<DeviceMetrics>) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx, metrics }
    }

    pub(crate) fn emit(&self, event: DeviceEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {},
            Err(TrySendError::Full(event)) => {
                DeviceMetrics::add(&self.metrics.events_dropped, 1);
                trace!("event queue full, dropping {:?}", event);
            },
            Err(TrySendError::Disconnected(_)) => {},
        }
    }

    pub(crate) fn subscribe(&self) -> Receiver<DeviceEvent> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_is_counted() {
        let metrics = Arc::new(DeviceMetrics::new());
        let bus = EventBus::new(1, metrics.clone());
        bus.emit(DeviceEvent::FrameError("a".into()));
        bus.emit(DeviceEvent::FrameError("b".into()));

        let rx = bus.subscribe();
        assert_eq!(rx.try_recv().unwrap(), DeviceEvent::FrameError("a".into()));
        assert!(rx.try_recv().is_err());
        assert_eq!(metrics.snapshot().events_dropped, 1);
    }
}
