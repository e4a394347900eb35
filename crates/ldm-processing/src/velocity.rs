//! 速度计算
//!
//! 速度 = 距离差 / 时间差（mm/s）。会话的第一个样本，以及与上一样本间隔超过
//! 陈旧阈值的样本，视为新序列的起点，速度未定义。

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// 默认陈旧阈值
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(2);

/// 速度历史容量
pub const VELOCITY_HISTORY_LEN: usize = 1000;

/// 默认运动判定阈值（mm/s）
pub const DEFAULT_MOTION_THRESHOLD_MM_S: f64 = 10.0;

/// 相邻样本速度计算
#[derive(Debug, Clone)]
pub struct VelocityTracker {
    previous: Option<(u64, u32)>,
    staleness_us: u64,
}

impl VelocityTracker {
    pub fn new(staleness: Duration) -> Self {
        Self {
            previous: None,
            staleness_us: staleness.as_micros().min(u128::from(u64::MAX)) as u64,
        }
    }

    /// 更新并返回速度（mm/s）
    ///
    /// 调用方保证时间戳严格递增。
    pub fn update(&mut self, timestamp_us: u64, distance_mm: u32) -> Option<f64> {
        let previous = self.previous.replace((timestamp_us, distance_mm));
        let (prev_ts, prev_distance) = previous?;

        let dt_us = timestamp_us.checked_sub(prev_ts)?;
        if dt_us == 0 || dt_us > self.staleness_us {
            return None;
        }

        let dd = f64::from(distance_mm) - f64::from(prev_distance);
        Some(dd / (dt_us as f64 / 1_000_000.0))
    }

    /// 开始新序列（重连后调用）
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_STALENESS)
    }
}

/// 运动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionKind {
    /// 静止
    Stationary,
    /// 靠近（距离减小）
    Approaching,
    /// 远离（距离增大）
    Receding,
}

impl MotionKind {
    pub fn classify(velocity_mm_s: f64, threshold_mm_s: f64) -> Self {
        if velocity_mm_s.abs() < threshold_mm_s {
            Self::Stationary
        } else if velocity_mm_s > 0.0 {
            Self::Receding
        } else {
            Self::Approaching
        }
    }
}

/// mm/s → km/h
pub fn mm_per_s_to_km_per_h(velocity_mm_s: f64) -> f64 {
    velocity_mm_s * 0.0036
}

/// 速度统计
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityStats {
    pub current_mm_s: f64,
    pub mean_mm_s: f64,
    pub min_mm_s: f64,
    pub max_mm_s: f64,
    /// 加速度（mm/s²），由相邻两个速度及其真实时间差计算
    pub acceleration_mm_s2: Option<f64>,
    pub count: usize,
}

/// 速度历史（最近 [`VELOCITY_HISTORY_LEN`] 个）
#[derive(Debug, Clone, Default)]
pub struct VelocityHistory {
    values: VecDeque<(u64, f64)>,
}

impl VelocityHistory {
    pub fn push(&mut self, timestamp_us: u64, velocity_mm_s: f64) {
        if self.values.len() == VELOCITY_HISTORY_LEN {
            self.values.pop_front();
        }
        self.values.push_back((timestamp_us, velocity_mm_s));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// 最近 `count` 个速度
    pub fn recent(&self, count: usize) -> Vec<f64> {
        let skip = self.values.len().saturating_sub(count);
        self.values.iter().skip(skip).map(|(_, v)| *v).collect()
    }

    pub fn acceleration(&self) -> Option<f64> {
        let n = self.values.len();
        if n < 2 {
            return None;
        }
        let (t1, v1) = self.values[n - 2];
        let (t2, v2) = self.values[n - 1];
        let dt = t2.checked_sub(t1).filter(|dt| *dt > 0)? as f64 / 1_000_000.0;
        Some((v2 - v1) / dt)
    }

    pub fn stats(&self) -> Option<VelocityStats> {
        let (_, current) = *self.values.back()?;
        let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
        for (_, v) in &self.values {
            min = min.min(*v);
            max = max.max(*v);
            sum += v;
        }
        Some(VelocityStats {
            current_mm_s: current,
            mean_mm_s: sum / self.values.len() as f64,
            min_mm_s: min,
            max_mm_s: max,
            acceleration_mm_s2: self.acceleration(),
            count: self.values.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: u64 = 1_000_000;

    #[test]
    fn test_first_sample_has_no_velocity() {
        let mut tracker = VelocityTracker::default();
        assert_eq!(tracker.update(0, 1000), None);
    }

    #[test]
    fn test_consecutive_velocities() {
        let mut tracker = VelocityTracker::default();
        assert_eq!(tracker.update(0, 1000), None);
        assert_eq!(tracker.update(SEC, 1010), Some(10.0));
        assert_eq!(tracker.update(2 * SEC, 1005), Some(-5.0));
    }

    #[test]
    fn test_stale_gap_starts_new_sequence() {
        let mut tracker = VelocityTracker::new(Duration::from_secs(1));
        tracker.update(0, 1000);
        assert_eq!(tracker.update(5 * SEC, 2000), None);
        assert_eq!(tracker.update(5 * SEC + SEC / 2, 2010), Some(20.0));
    }

    #[test]
    fn test_reset() {
        let mut tracker = VelocityTracker::default();
        tracker.update(0, 1000);
        tracker.reset();
        assert_eq!(tracker.update(SEC, 1010), None);
    }

    #[test]
    fn test_motion_kind() {
        assert_eq!(MotionKind::classify(3.0, 10.0), MotionKind::Stationary);
        assert_eq!(MotionKind::classify(25.0, 10.0), MotionKind::Receding);
        assert_eq!(MotionKind::classify(-25.0, 10.0), MotionKind::Approaching);
    }

    #[test]
    fn test_unit_conversion() {
        // 1000 mm/s = 1 m/s = 3.6 km/h
        assert!((mm_per_s_to_km_per_h(1000.0) - 3.6).abs() < 1e-12);
    }

    #[test]
    fn test_history_stats_and_acceleration() {
        let mut history = VelocityHistory::default();
        assert!(history.stats().is_none());
        history.push(0, 10.0);
        history.push(SEC / 2, 20.0);
        history.push(SEC, -6.0);
        let stats = history.stats().unwrap();
        assert_eq!(stats.current_mm_s, -6.0);
        assert_eq!(stats.min_mm_s, -6.0);
        assert_eq!(stats.max_mm_s, 20.0);
        assert!((stats.mean_mm_s - 8.0).abs() < 1e-12);
        // (-6 - 20) / 0.5 s
        assert_eq!(stats.acceleration_mm_s2, Some(-52.0));
        assert_eq!(history.recent(2), vec![20.0, -6.0]);
    }
}
