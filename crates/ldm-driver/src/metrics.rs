//! 协议引擎运行指标
//!
//! 原子计数器，可在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 协议引擎实时指标
///
/// # 使用示例
///
/// ```rust
/// use ldm_driver::DeviceMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = DeviceMetrics::default();
/// metrics.frames_decoded.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().frames_decoded, 1);
/// ```
#[derive(Debug, Default)]
pub struct DeviceMetrics {
    /// 接收字节数
    pub bytes_rx: AtomicU64,
    /// 发送字节数
    pub bytes_tx: AtomicU64,
    /// 成功解码的帧数
    pub frames_decoded: AtomicU64,
    /// 损坏帧（校验和/长度错误）
    pub corrupt_frames: AtomicU64,
    /// 未匹配且被丢弃的帧
    pub unsolicited_frames: AtomicU64,
    /// 已写出的命令数（含重试）
    pub commands_sent: AtomicU64,
    /// 重试次数
    pub retries: AtomicU64,
    /// 单次等待超时次数
    pub timeouts: AtomicU64,
    /// 转发给 pipeline 的样本数
    pub samples_forwarded: AtomicU64,
    /// pipeline 队列满导致丢弃的样本数
    pub samples_dropped: AtomicU64,
    /// 事件队列满导致丢弃的事件数
    pub events_dropped: AtomicU64,
}

impl DeviceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_rx: self.bytes_rx.load(Ordering::Relaxed),
            bytes_tx: self.bytes_tx.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            corrupt_frames: self.corrupt_frames.load(Ordering::Relaxed),
            unsolicited_frames: self.unsolicited_frames.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            samples_forwarded: self.samples_forwarded.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.bytes_rx,
            &self.bytes_tx,
            &self.frames_decoded,
            &self.corrupt_frames,
            &self.unsolicited_frames,
            &self.commands_sent,
            &self.retries,
            &self.timeouts,
            &self.samples_forwarded,
            &self.samples_dropped,
            &self.events_dropped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub bytes_rx: u64,
    pub bytes_tx: u64,
    pub frames_decoded: u64,
    pub corrupt_frames: u64,
    pub unsolicited_frames: u64,
    pub commands_sent: u64,
    pub retries: u64,
    pub timeouts: u64,
    pub samples_forwarded: u64,
    pub samples_dropped: u64,
    pub events_dropped: u64,
}

impl MetricsSnapshot {
    /// 损坏帧占比（百分比），无帧时为 0
    pub fn corruption_rate(&self) -> f64 {
        let total = self.frames_decoded + self.corrupt_frames;
        if total == 0 {
            return 0.0;
        }
        self.corrupt_frames as f64 / total as f64 * 100.0
    }
}
