//! # LDM Processing
//!
//! 测量数据实时处理：
//!
//! - `window`: 滚动窗口统计（均值、最小/最大值、平均信号质量）
//! - `velocity`: 相邻样本速度、速度统计、运动方向
//! - `drill`: 钻进/停止/提钻状态识别（迟滞）
//! - `processor`: 单写者处理器，输出 [`ProcessedSample`]
//! - `pipeline`: 工作线程与 [`SampleSink`] 接口
//! - `export`: CSV 导出
//!
//! 处理器是纯变换：相同的输入序列总是得到相同的输出序列。

use thiserror::Error;

pub mod drill;
pub mod export;
pub mod pipeline;
pub mod processor;
pub mod velocity;
pub mod window;

pub use drill::{DrillDetectorConfig, DrillState, DrillStateDetector};
pub use export::{CsvSink, write_csv};
pub use pipeline::{
    DEFAULT_PIPELINE_CAPACITY, PipelineEvent, PipelineHandle, PipelineInput, ProcessorSnapshot,
    SampleSink, pipeline_channel, spawn_pipeline,
};
pub use processor::{ProcessedSample, ProcessingConfig, Processor};
pub use velocity::{MotionKind, VelocityStats, VelocityTracker, mm_per_s_to_km_per_h};
pub use window::{RollingStats, RollingWindow};

/// 处理层错误
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Non-monotonic timestamp: {current} us after {previous} us")]
    NonMonotonicTimestamp { previous: u64, current: u64 },

    #[error("Distance {distance_mm} mm exceeds range limit {max_mm} mm")]
    DistanceOutOfRange { distance_mm: u32, max_mm: u32 },

    #[error("CSV export error: {0}")]
    Export(#[from] csv::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}
