//! 样本处理器（纯变换，单写者）

use crate::drill::{DrillDetectorConfig, DrillState, DrillStateDetector};
use crate::velocity::{DEFAULT_STALENESS, VelocityHistory, VelocityStats, VelocityTracker};
use crate::window::{DEFAULT_WINDOW_SIZE, RollingStats, RollingWindow};
use crate::ProcessingError;
use ldm_protocol::MeasurementSample;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 处理配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingConfig {
    /// 滚动窗口容量
    pub window_size: usize,
    /// 超过该间隔视为新序列（速度未定义）
    pub staleness: Duration,
    /// 低于该信号质量的样本标记为低置信度
    pub min_quality: u8,
    /// 合法距离上限（毫米）
    pub max_distance_mm: u32,
    /// 钻进状态识别（`None` 表示关闭）
    pub drill: Option<DrillDetectorConfig>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            staleness: DEFAULT_STALENESS,
            min_quality: 20,
            max_distance_mm: 100_000,
            drill: None,
        }
    }
}

/// 处理后的样本（创建后不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSample {
    /// 会话内序号（从 0 开始）
    pub sequence: u64,
    pub sample: MeasurementSample,
    /// 速度（mm/s），序列起点为 `None`
    pub velocity_mm_s: Option<f64>,
    pub stats: RollingStats,
    /// 信号质量低于阈值
    pub low_confidence: bool,
    pub activity: Option<DrillState>,
}

impl ProcessedSample {
    pub fn distance_mm(&self) -> u32 {
        self.sample.distance_mm
    }

    pub fn quality(&self) -> u8 {
        self.sample.quality
    }
}

/// 处理器
pub struct Processor {
    config: ProcessingConfig,
    window: RollingWindow,
    velocity: VelocityTracker,
    history: VelocityHistory,
    drill: Option<DrillStateDetector>,
    last_timestamp_us: Option<u64>,
    sequence: u64,
    first_timestamp_us: Option<u64>,
}

impl Processor {
    pub fn new(config: ProcessingConfig) -> Self {
        Self {
            window: RollingWindow::new(config.window_size),
            velocity: VelocityTracker::new(config.staleness),
            history: VelocityHistory::default(),
            drill: config.drill.map(DrillStateDetector::new),
            last_timestamp_us: None,
            sequence: 0,
            first_timestamp_us: None,
            config,
        }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// 处理一个样本
    ///
    /// # 错误
    /// - `ProcessingError::NonMonotonicTimestamp`：时间戳不晚于上一个样本
    /// - `ProcessingError::DistanceOutOfRange`：距离超出上限
    ///
    /// 出错时处理器状态不变。
    pub fn process(&mut self, sample: MeasurementSample) -> Result<ProcessedSample, ProcessingError> {
        if let Some(previous) = self.last_timestamp_us
            && sample.timestamp_us <= previous
        {
            return Err(ProcessingError::NonMonotonicTimestamp {
                previous,
                current: sample.timestamp_us,
            });
        }
        if sample.distance_mm > self.config.max_distance_mm {
            return Err(ProcessingError::DistanceOutOfRange {
                distance_mm: sample.distance_mm,
                max_mm: self.config.max_distance_mm,
            });
        }

        self.last_timestamp_us = Some(sample.timestamp_us);
        self.first_timestamp_us.get_or_insert(sample.timestamp_us);

        let velocity_mm_s = self.velocity.update(sample.timestamp_us, sample.distance_mm);
        if let Some(v) = velocity_mm_s {
            self.history.push(sample.timestamp_us, v);
        }

        let stats = self.window.push(sample.distance_mm, sample.quality);

        let activity = match (self.drill.as_mut(), velocity_mm_s) {
            (Some(detector), Some(v)) => Some(detector.update(v, sample.timestamp_us)),
            (Some(detector), None) => Some(detector.state()),
            (None, _) => None,
        };

        let processed = ProcessedSample {
            sequence: self.sequence,
            sample,
            velocity_mm_s,
            stats,
            low_confidence: sample.quality < self.config.min_quality,
            activity,
        };
        self.sequence += 1;
        Ok(processed)
    }

    /// 开始新会话：清空窗口与速度序列
    pub fn reset(&mut self) {
        self.window.clear();
        self.velocity.reset();
        self.history.clear();
        if let Some(detector) = self.drill.as_mut() {
            detector.reset();
        }
        self.last_timestamp_us = None;
        self.first_timestamp_us = None;
        self.sequence = 0;
    }

    pub fn velocity_stats(&self) -> Option<VelocityStats> {
        self.history.stats()
    }

    pub fn drill_efficiency_percent(&self) -> Option<f64> {
        self.drill.as_ref().map(DrillStateDetector::efficiency_percent)
    }

    /// 本会话平均测量速率（样本/秒）
    pub fn measurement_rate_hz(&self) -> f64 {
        match (self.first_timestamp_us, self.last_timestamp_us) {
            (Some(first), Some(last)) if last > first && self.sequence > 1 => {
                (self.sequence - 1) as f64 / ((last - first) as f64 / 1_000_000.0)
            },
            _ => 0.0,
        }
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new(ProcessingConfig::default())
    }
}
