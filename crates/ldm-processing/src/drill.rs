//! 钻进状态识别
//!
//! 基于速度的迟滞判定：速度需持续低于阈值一段时间才切换为停止，
//! 持续高于阈值一段时间才切换为钻进（正向）或提钻（反向）。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 钻进状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillState {
    Stopped,
    Drilling,
    Retracting,
}

/// 迟滞参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrillDetectorConfig {
    /// 速度阈值（mm/s）
    pub velocity_threshold_mm_s: f64,
    /// 持续低于阈值多久切换为停止
    #[serde(with = "duration_secs")]
    pub min_duration_below: Duration,
    /// 持续高于阈值多久切换为钻进/提钻
    #[serde(with = "duration_secs")]
    pub min_duration_above: Duration,
}

impl Default for DrillDetectorConfig {
    fn default() -> Self {
        Self {
            velocity_threshold_mm_s: 5.0,
            min_duration_below: Duration::from_secs(3),
            min_duration_above: Duration::from_secs(1),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Streak {
    Below,
    Positive,
    Negative,
}

/// 钻进状态检测器
#[derive(Debug, Clone)]
pub struct DrillStateDetector {
    config: DrillDetectorConfig,
    state: DrillState,
    streak: Option<(Streak, u64)>,
    last_update_us: Option<u64>,
    drilling_us: u64,
    idle_us: u64,
}

impl DrillStateDetector {
    pub fn new(config: DrillDetectorConfig) -> Self {
        Self {
            config,
            state: DrillState::Stopped,
            streak: None,
            last_update_us: None,
            drilling_us: 0,
            idle_us: 0,
        }
    }

    pub fn state(&self) -> DrillState {
        self.state
    }

    /// 输入一个速度样本，返回当前状态
    pub fn update(&mut self, velocity_mm_s: f64, timestamp_us: u64) -> DrillState {
        if let Some(last) = self.last_update_us {
            let dt = timestamp_us.saturating_sub(last);
            if self.state == DrillState::Drilling {
                self.drilling_us += dt;
            } else {
                self.idle_us += dt;
            }
        }
        self.last_update_us = Some(timestamp_us);

        let thr = self.config.velocity_threshold_mm_s;
        let kind = if velocity_mm_s.abs() < thr {
            Streak::Below
        } else if velocity_mm_s > 0.0 {
            Streak::Positive
        } else {
            Streak::Negative
        };

        let since = match self.streak {
            Some((current, start)) if current == kind => start,
            _ => {
                self.streak = Some((kind, timestamp_us));
                timestamp_us
            },
        };
        let held = Duration::from_micros(timestamp_us.saturating_sub(since));

        let next = match (self.state, kind) {
            (DrillState::Drilling | DrillState::Retracting, Streak::Below)
                if held >= self.config.min_duration_below =>
            {
                Some(DrillState::Stopped)
            },
            (DrillState::Stopped | DrillState::Retracting, Streak::Positive)
                if held >= self.config.min_duration_above =>
            {
                Some(DrillState::Drilling)
            },
            (DrillState::Stopped | DrillState::Drilling, Streak::Negative)
                if held >= self.config.min_duration_above =>
            {
                Some(DrillState::Retracting)
            },
            _ => None,
        };

        if let Some(state) = next {
            tracing::debug!("drill state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.streak = None;
        }
        self.state
    }

    /// 钻进时间占比（%）
    pub fn efficiency_percent(&self) -> f64 {
        let total = self.drilling_us + self.idle_us;
        if total == 0 {
            return 0.0;
        }
        self.drilling_us as f64 / total as f64 * 100.0
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}

impl Default for DrillStateDetector {
    fn default() -> Self {
        Self::new(DrillDetectorConfig::default())
    }
}
