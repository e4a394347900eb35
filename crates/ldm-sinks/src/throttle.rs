//! MQTT 发布节流
//!
//! 两种策略：
//! - `Interval`：按样本时间戳计时，距上次发布不少于间隔才发布
//! - `EveryNth`：会话内第 1、N+1、2N+1... 个样本发布
//!
//! 使用样本时间戳而非墙上时钟，相同输入序列总是得到相同的发布序列。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认发布间隔
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_millis(500);

/// 节流策略
///
/// TOML 表示：`publish = { interval_ms = 500 }` 或 `publish = { every_nth = 10 }`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishPolicy {
    #[serde(rename = "interval_ms")]
    Interval(#[serde(with = "duration_ms")] Duration),
    EveryNth(u32),
}

impl Default for PublishPolicy {
    fn default() -> Self {
        PublishPolicy::Interval(DEFAULT_PUBLISH_INTERVAL)
    }
}

impl PublishPolicy {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            PublishPolicy::Interval(interval) if interval.is_zero() => {
                Err("publish interval must be greater than zero".to_string())
            },
            PublishPolicy::EveryNth(0) => Err("every_nth must be at least 1".to_string()),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for PublishPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishPolicy::Interval(interval) => write!(f, "every {} ms", interval.as_millis()),
            PublishPolicy::EveryNth(n) => write!(f, "every {} sample(s)", n),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// 节流器（单线程使用）
#[derive(Debug, Clone)]
pub struct PublishThrottle {
    policy: PublishPolicy,
    last_published_us: Option<u64>,
    seen: u64,
}

impl PublishThrottle {
    pub fn new(policy: PublishPolicy) -> Self {
        Self {
            policy,
            last_published_us: None,
            seen: 0,
        }
    }

    pub fn policy(&self) -> PublishPolicy {
        self.policy
    }

    /// 判断时间戳为 `timestamp_us` 的样本是否应发布
    pub fn should_publish(&mut self, timestamp_us: u64) -> bool {
        let publish = match self.policy {
            PublishPolicy::Interval(interval) => match self.last_published_us {
                None => true,
                Some(last) => {
                    timestamp_us.saturating_sub(last) >= interval.as_micros() as u64
                },
            },
            PublishPolicy::EveryNth(n) => self.seen % n.max(1) as u64 == 0,
        };
        self.seen += 1;
        if publish {
            self.last_published_us = Some(timestamp_us);
        }
        publish
    }

    /// 新会话：下一个样本立即发布
    pub fn reset(&mut self) {
        self.last_published_us = None;
        self.seen = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1000;

    fn run(throttle: &mut PublishThrottle, timestamps: impl IntoIterator<Item = u64>) -> Vec<u64> {
        timestamps
            .into_iter()
            .filter(|&t| throttle.should_publish(t))
            .collect()
    }

    #[test]
    fn test_interval_policy() {
        let mut throttle = PublishThrottle::new(PublishPolicy::Interval(Duration::from_millis(500)));
        // 10 Hz 样本，2 秒
        let published = run(&mut throttle, (0..20).map(|i| i * 100 * MS));
        assert_eq!(published, vec![0, 500 * MS, 1000 * MS, 1500 * MS]);
    }

    #[test]
    fn test_interval_measured_from_last_publish() {
        let mut throttle = PublishThrottle::new(PublishPolicy::Interval(Duration::from_millis(500)));
        let published = run(&mut throttle, [0, 400 * MS, 700 * MS, 900 * MS, 1300 * MS]);
        assert_eq!(published, vec![0, 700 * MS, 1300 * MS]);
    }

    #[test]
    fn test_every_nth_policy() {
        let mut throttle = PublishThrottle::new(PublishPolicy::EveryNth(3));
        let published = run(&mut throttle, 0..10);
        assert_eq!(published, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_every_nth_one_publishes_all() {
        let mut throttle = PublishThrottle::new(PublishPolicy::EveryNth(1));
        assert_eq!(run(&mut throttle, 0..4).len(), 4);
    }

    #[test]
    fn test_reset_publishes_next_sample() {
        let mut throttle = PublishThrottle::new(PublishPolicy::Interval(Duration::from_secs(10)));
        assert!(throttle.should_publish(5 * MS));
        assert!(!throttle.should_publish(6 * MS));
        throttle.reset();
        // 新会话时间戳可能更小
        assert!(throttle.should_publish(MS));

        let mut throttle = PublishThrottle::new(PublishPolicy::EveryNth(5));
        assert!(throttle.should_publish(0));
        assert!(!throttle.should_publish(1));
        throttle.reset();
        assert!(throttle.should_publish(2));
    }

    #[test]
    fn test_validate() {
        assert!(PublishPolicy::default().validate().is_ok());
        assert!(PublishPolicy::Interval(Duration::ZERO).validate().is_err());
        assert!(PublishPolicy::EveryNth(0).validate().is_err());
        assert!(PublishPolicy::EveryNth(2).validate().is_ok());
    }

    #[test]
    fn test_display() {
        assert_eq!(PublishPolicy::default().to_string(), "every 500 ms");
        assert_eq!(PublishPolicy::EveryNth(4).to_string(), "every 4 sample(s)");
    }

    #[test]
    fn test_serde_json_shape() {
        let json = serde_json::to_string(&PublishPolicy::default()).unwrap();
        assert_eq!(json, r#"{"interval_ms":500}"#);
        let policy: PublishPolicy = serde_json::from_str(r#"{"every_nth":10}"#).unwrap();
        assert_eq!(policy, PublishPolicy::EveryNth(10));
    }
}
