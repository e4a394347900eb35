//! 实时显示 sink
//!
//! UI 线程可能卡顿，pipeline 不能等它。队列满时丢弃最旧的更新并计数，
//! 保证 UI 恢复后看到的总是最新的数据。

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use ldm_processing::{ProcessedSample, SampleSink};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// 默认显示队列容量
pub const DEFAULT_DISPLAY_CAPACITY: usize = 128;

/// 推送给显示端的更新
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayUpdate {
    Sample(Arc<ProcessedSample>),
    /// 新会话开始（显示端应清空曲线）
    SessionStarted,
}

/// 创建显示 sink 与对应的接收端
///
/// `capacity` 为 0 时按 1 处理。
pub fn display_channel(capacity: usize) -> (DisplaySink, DisplayFeed) {
    let (tx, rx) = bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let sink = DisplaySink {
        tx,
        evict: rx.clone(),
        dropped: dropped.clone(),
    };
    (sink, DisplayFeed { rx, dropped })
}

/// 显示 sink（pipeline 侧）
pub struct DisplaySink {
    tx: Sender<DisplayUpdate>,
    // 与 feed 共享同一队列，用于丢弃最旧元素
    evict: Receiver<DisplayUpdate>,
    dropped: Arc<AtomicU64>,
}

impl DisplaySink {
    fn push(&mut self, update: DisplayUpdate) {
        let rejected = match self.tx.try_send(update) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => return,
            Err(TrySendError::Full(rejected)) => rejected,
        };
        if self.evict.try_recv().is_ok() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        // 驱逐后仍满（feed 并发读写竞争）时丢弃本次更新
        if self.tx.try_send(rejected).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 已丢弃的更新数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SampleSink for DisplaySink {
    fn name(&self) -> &str {
        "display"
    }

    fn accept(&mut self, sample: &Arc<ProcessedSample>) {
        self.push(DisplayUpdate::Sample(sample.clone()));
    }

    fn on_session_start(&mut self) {
        self.push(DisplayUpdate::SessionStarted);
    }
}

/// 显示端（UI 侧）
#[derive(Clone)]
pub struct DisplayFeed {
    rx: Receiver<DisplayUpdate>,
    dropped: Arc<AtomicU64>,
}

impl DisplayFeed {
    /// 阻塞等待下一个更新
    ///
    /// 超时返回 `Ok(None)`；sink 已销毁且队列为空时返回 `Err`。
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<DisplayUpdate>, RecvTimeoutError> {
        match self.rx.recv_timeout(timeout) {
            Ok(update) => Ok(Some(update)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 取出当前排队的全部更新
    pub fn drain(&self) -> Vec<DisplayUpdate> {
        self.rx.try_iter().collect()
    }

    /// 丢弃积压，只返回最新的样本
    pub fn latest(&self) -> Option<Arc<ProcessedSample>> {
        self.rx
            .try_iter()
            .filter_map(|update| match update {
                DisplayUpdate::Sample(sample) => Some(sample),
                DisplayUpdate::SessionStarted => None,
            })
            .last()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// 因溢出被丢弃的更新数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
