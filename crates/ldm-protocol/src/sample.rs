//! 测量样本

use crate::Measurement;

/// 带时间戳的测量样本（创建后不可变）
///
/// - `timestamp_us`：单调时钟微秒，用于计算速度
/// - `system_time_ms`：墙钟毫秒（UNIX 纪元），用于对外发布
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeasurementSample {
    pub timestamp_us: u64,
    pub system_time_ms: u64,
    pub distance_mm: u32,
    pub quality: u8,
    pub raw_quality: u16,
}

impl MeasurementSample {
    pub fn new(timestamp_us: u64, distance_mm: u32, quality: u8) -> Self {
        Self {
            timestamp_us,
            system_time_ms: timestamp_us / 1000,
            distance_mm,
            quality,
            raw_quality: u16::from(quality),
        }
    }

    pub fn from_measurement(measurement: &Measurement, timestamp_us: u64, system_time_ms: u64) -> Self {
        Self {
            timestamp_us,
            system_time_ms,
            distance_mm: measurement.distance_mm,
            quality: measurement.quality,
            raw_quality: measurement.raw_quality,
        }
    }

    pub fn with_system_time_ms(mut self, system_time_ms: u64) -> Self {
        self.system_time_ms = system_time_ms;
        self
    }

    pub fn distance_m(&self) -> f64 {
        f64::from(self.distance_mm) / 1000.0
    }

    /// 时间戳（秒）
    pub fn timestamp_s(&self) -> f64 {
        self.timestamp_us as f64 / 1_000_000.0
    }
}
