//! MQTT 载荷
//!
//! 完整格式：
//!
//! ```json
//! {
//!   "distance_mm": 1500,
//!   "signal_quality": 80,
//!   "velocity_mm_s": 10.0,
//!   "timestamp_ms": 1760601600000,
//!   "timestamp": "2025-10-16T08:00:00.000Z",
//!   "average_distance_mm": 1495.5,
//!   "low_confidence": false,
//!   "activity": "drilling"
//! }
//! ```
//!
//! 精简格式只保留 `timestamp`、`distance_mm`、`signal_quality`、`velocity_mm_s`。
//! 速度未定义时为 `null`；未开启钻进识别时省略 `activity`。

use crate::SinkError;
use chrono::{DateTime, SecondsFormat, Utc};
use ldm_processing::{DrillState, ProcessedSample};
use serde::{Deserialize, Serialize};

/// 载荷格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    #[default]
    Full,
    Minimal,
}

/// 完整载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttPayload {
    pub distance_mm: u32,
    pub signal_quality: u8,
    pub velocity_mm_s: Option<f64>,
    /// UNIX 毫秒时间戳
    pub timestamp_ms: u64,
    /// ISO 8601（UTC）
    pub timestamp: String,
    pub average_distance_mm: f64,
    pub low_confidence: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<DrillState>,
}

#[derive(Serialize)]
struct MinimalPayload<'a> {
    timestamp: &'a str,
    distance_mm: u32,
    signal_quality: u8,
    velocity_mm_s: Option<f64>,
}

impl MqttPayload {
    pub fn from_sample(sample: &ProcessedSample) -> Self {
        let timestamp_ms = sample.sample.system_time_ms;
        Self {
            distance_mm: sample.distance_mm(),
            signal_quality: sample.quality(),
            velocity_mm_s: sample.velocity_mm_s.map(round_2),
            timestamp_ms,
            timestamp: iso_timestamp(timestamp_ms),
            average_distance_mm: round_2(sample.stats.mean_distance_mm),
            low_confidence: sample.low_confidence,
            activity: sample.activity,
        }
    }

    /// 序列化为 JSON 字节
    pub fn to_json(&self, format: PayloadFormat) -> Result<Vec<u8>, SinkError> {
        let bytes = match format {
            PayloadFormat::Full => serde_json::to_vec(self)?,
            PayloadFormat::Minimal => serde_json::to_vec(&MinimalPayload {
                timestamp: &self.timestamp,
                distance_mm: self.distance_mm,
                signal_quality: self.signal_quality,
                velocity_mm_s: self.velocity_mm_s,
            })?,
        };
        Ok(bytes)
    }
}

fn iso_timestamp(unix_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(unix_ms as i64)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn round_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldm_processing::{DrillDetectorConfig, ProcessingConfig, Processor};
    use ldm_protocol::MeasurementSample;
    use serde_json::Value;

    fn sample_at(unix_ms: u64, distance_mm: u32, quality: u8) -> MeasurementSample {
        MeasurementSample {
            system_time_ms: unix_ms,
            ..MeasurementSample::new(unix_ms * 1000, distance_mm, quality)
        }
    }

    #[test]
    fn test_full_payload() {
        let mut processor = Processor::default();
        processor.process(sample_at(1_760_601_600_000, 1000, 80)).unwrap();
        let second = processor.process(sample_at(1_760_601_601_000, 1010, 80)).unwrap();

        let payload = MqttPayload::from_sample(&second);
        let json: Value = serde_json::from_slice(&payload.to_json(PayloadFormat::Full).unwrap()).unwrap();
        assert_eq!(json["distance_mm"], 1010);
        assert_eq!(json["signal_quality"], 80);
        assert_eq!(json["velocity_mm_s"], 10.0);
        assert_eq!(json["timestamp_ms"], 1_760_601_601_000u64);
        assert_eq!(json["timestamp"], "2025-10-16T08:00:01.000Z");
        assert_eq!(json["average_distance_mm"], 1005.0);
        assert_eq!(json["low_confidence"], false);
        assert!(json.get("activity").is_none());
    }

    #[test]
    fn test_first_sample_velocity_is_null() {
        let mut processor = Processor::default();
        let first = processor.process(sample_at(1_000, 1500, 5)).unwrap();
        let payload = MqttPayload::from_sample(&first);
        assert!(payload.low_confidence);

        let json: Value = serde_json::from_slice(&payload.to_json(PayloadFormat::Full).unwrap()).unwrap();
        assert!(json["velocity_mm_s"].is_null());
    }

    #[test]
    fn test_activity_included_when_enabled() {
        let mut processor = Processor::new(ProcessingConfig {
            drill: Some(DrillDetectorConfig::default()),
            ..ProcessingConfig::default()
        });
        let first = processor.process(sample_at(1_000, 1500, 80)).unwrap();
        let json: Value = serde_json::from_slice(
            &MqttPayload::from_sample(&first)
                .to_json(PayloadFormat::Full)
                .unwrap(),
        )
        .unwrap();
        assert_eq!(json["activity"], "stopped");
    }

    #[test]
    fn test_minimal_payload() {
        let mut processor = Processor::default();
        let first = processor.process(sample_at(1_760_601_600_000, 1500, 80)).unwrap();
        let bytes = MqttPayload::from_sample(&first)
            .to_json(PayloadFormat::Minimal)
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 4);
        assert_eq!(json["timestamp"], "2025-10-16T08:00:00.000Z");
        assert_eq!(json["distance_mm"], 1500);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_2(1.23456), 1.23);
        assert_eq!(round_2(-7.5), -7.5);
    }
}
