//! 通信录制钩子
//!
//! 把出站字节与入站帧写入有界通道，由使用方在自己的线程上消费（例如 CLI 的
//! `--trace-frames` 十六进制输出）。队列满时丢弃并计数，不阻塞 IO 线程。

use crate::heartbeat::monotonic_micros;
use crate::hooks::FrameObserver;
use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, bounded};
use ldm_protocol::{ProtocolError, ResponseFrame};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 默认录制队列容量
pub const DEFAULT_RECORDING_CAPACITY: usize = 1024;

/// 一条通信记录
#[derive(Debug, Clone, PartialEq)]
pub enum TrafficRecord {
    Sent { timestamp_us: u64, bytes: Bytes },
    Received { timestamp_us: u64, frame: ResponseFrame },
    DecodeError { timestamp_us: u64, error: ProtocolError },
}

impl TrafficRecord {
    pub fn timestamp_us(&self) -> u64 {
        match self {
            Self::Sent { timestamp_us, .. }
            | Self::Received { timestamp_us, .. }
            | Self::DecodeError { timestamp_us, .. } => *timestamp_us,
        }
    }
}

impl fmt::Display for TrafficRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = self.timestamp_us() as f64 / 1_000_000.0;
        match self {
            Self::Sent { bytes, .. } => write!(f, "[{ts:>10.3}] TX {}", hex::encode_upper(bytes)),
            Self::Received { frame, .. } => write!(
                f,
                "[{ts:>10.3}] RX {} {}",
                frame,
                hex::encode_upper(&frame.payload)
            ),
            Self::DecodeError { error, .. } => write!(f, "[{ts:>10.3}] !! {error}"),
        }
    }
}

/// 录制钩子
pub struct TrafficRecorder {
    tx: Sender<TrafficRecord>,
    dropped: Arc<AtomicU64>,
}

impl TrafficRecorder {
    pub fn new() -> (Self, Receiver<TrafficRecord>) {
        Self::with_capacity(DEFAULT_RECORDING_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<TrafficRecord>) {
        let (tx, rx) = bounded(capacity.max(1));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// 丢弃计数（可在录制期间持有）
    pub fn dropped(&self) -> &Arc<AtomicU64> {
        &self.dropped
    }

    fn push(&self, record: TrafficRecord) {
        if self.tx.try_send(record).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl FrameObserver for TrafficRecorder {
    fn on_frame_received(&self, frame: &ResponseFrame) {
        self.push(TrafficRecord::Received {
            timestamp_us: monotonic_micros(),
            frame: frame.clone(),
        });
    }

    fn on_bytes_sent(&self, bytes: &[u8]) {
        self.push(TrafficRecord::Sent {
            timestamp_us: monotonic_micros(),
            bytes: Bytes::copy_from_slice(bytes),
        });
    }

    fn on_decode_error(&self, error: &ProtocolError) {
        self.push(TrafficRecord::DecodeError {
            timestamp_us: monotonic_micros(),
            error: error.clone(),
        });
    }
}
