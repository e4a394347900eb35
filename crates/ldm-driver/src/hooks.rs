//! 帧观察钩子
//!
//! 在 IO 线程上对每一帧出站字节与入站解码结果触发回调，用于通信日志与录制。
//!
//! # 使用示例
//!
//! ```rust
//! use ldm_driver::hooks::{FrameObserver, HookManager};
//! use ldm_protocol::ResponseFrame;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct Counter(AtomicUsize);
//!
//! impl FrameObserver for Counter {
//!     fn on_frame_received(&self, _frame: &ResponseFrame) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//!
//! let counter = Arc::new(Counter::default());
//! let mut hooks = HookManager::new();
//! hooks.add_observer(counter.clone());
//! hooks.trigger_rx(&ResponseFrame::new_measurement(1500, 80));
//! assert_eq!(counter.0.load(Ordering::Relaxed), 1);
//! ```

use ldm_protocol::{ProtocolError, ResponseFrame};
use std::sync::Arc;

/// 帧观察者
///
/// 回调在 IO 线程上执行，实现必须非阻塞（推荐 `try_send` 到自己的通道）。
pub trait FrameObserver: Send + Sync {
    /// 收到并成功解码一帧
    fn on_frame_received(&self, frame: &ResponseFrame);

    /// 一条命令的字节已写出
    fn on_bytes_sent(&self, _bytes: &[u8]) {}

    /// 解码失败
    fn on_decode_error(&self, _error: &ProtocolError) {}
}

/// 观察者集合
#[derive(Default, Clone)]
pub struct HookManager {
    observers: Vec<Arc<dyn FrameObserver>>,
}

impl HookManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Arc<dyn FrameObserver>) {
        self.observers.push(observer);
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn trigger_rx(&self, frame: &ResponseFrame) {
        for observer in &self.observers {
            observer.on_frame_received(frame);
        }
    }

    pub fn trigger_tx(&self, bytes: &[u8]) {
        for observer in &self.observers {
            observer.on_bytes_sent(bytes);
        }
    }

    pub fn trigger_error(&self, error: &ProtocolError) {
        for observer in &self.observers {
            observer.on_decode_error(error);
        }
    }
}

impl std::fmt::Debug for HookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookManager")
            .field("observers", &self.observers.len())
            .finish()
    }
}
