//! CSV 导出

use crate::ProcessingError;
use crate::drill::DrillState;
use crate::pipeline::SampleSink;
use crate::processor::ProcessedSample;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Serialize)]
struct CsvRow {
    sequence: u64,
    timestamp_ms: u64,
    distance_mm: u32,
    signal_quality: u8,
    velocity_mm_s: Option<f64>,
    mean_distance_mm: f64,
    min_distance_mm: u32,
    max_distance_mm: u32,
    low_confidence: bool,
    activity: Option<DrillState>,
}

impl From<&ProcessedSample> for CsvRow {
    fn from(s: &ProcessedSample) -> Self {
        Self {
            sequence: s.sequence,
            timestamp_ms: s.sample.system_time_ms,
            distance_mm: s.sample.distance_mm,
            signal_quality: s.sample.quality,
            velocity_mm_s: s.velocity_mm_s,
            mean_distance_mm: s.stats.mean_distance_mm,
            min_distance_mm: s.stats.min_distance_mm,
            max_distance_mm: s.stats.max_distance_mm,
            low_confidence: s.low_confidence,
            activity: s.activity,
        }
    }
}

/// 一次性导出样本
pub fn write_csv<'a, W, I>(writer: W, samples: I) -> Result<(), ProcessingError>
where
    W: Write,
    I: IntoIterator<Item = &'a ProcessedSample>,
{
    let mut csv = csv::Writer::from_writer(writer);
    for sample in samples {
        csv.serialize(CsvRow::from(sample))?;
    }
    csv.flush()?;
    Ok(())
}

/// 逐条写入 CSV 的 sink
///
/// 写入失败时记录一次警告并停止写入，不影响 pipeline。
pub struct CsvSink<W: Write + Send> {
    writer: Option<csv::Writer<W>>,
}

impl<W: Write + Send> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(csv::Writer::from_writer(writer)),
        }
    }
}

impl<W: Write + Send> SampleSink for CsvSink<W> {
    fn name(&self) -> &str {
        "csv"
    }

    fn accept(&mut self, sample: &Arc<ProcessedSample>) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(e) = writer.serialize(CsvRow::from(sample.as_ref())) {
            warn!("CSV export stopped: {}", e);
            self.writer = None;
        }
    }

    fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut()
            && let Err(e) = writer.flush()
        {
            warn!("CSV flush failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::Processor;
    use ldm_protocol::MeasurementSample;

    #[test]
    fn test_write_csv() {
        let mut processor = Processor::default();
        let samples: Vec<_> = [(0u64, 1000u32), (1_000_000, 1010)]
            .into_iter()
            .map(|(t, d)| processor.process(MeasurementSample::new(t, d, 80)).unwrap())
            .collect();

        let mut out = Vec::new();
        write_csv(&mut out, &samples).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("sequence,timestamp_ms,distance_mm"));
        assert!(lines[1].starts_with("0,0,1000,80,,1000"));
        assert!(lines[2].starts_with("1,1000,1010,80,10.0,1005"));
    }
}
