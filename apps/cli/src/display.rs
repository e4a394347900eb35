//! 控制台输出

use ldm_sdk::ShutdownSignal;
use ldm_sdk::processing::{ProcessedSample, ProcessorSnapshot};
use ldm_sdk::sinks::{DisplayFeed, DisplayUpdate};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const FEED_POLL: Duration = Duration::from_millis(100);

/// 一行样本
pub fn format_sample(sample: &ProcessedSample) -> String {
    let velocity = match sample.velocity_mm_s {
        Some(v) => format!("{v:+9.1}"),
        None => format!("{:>9}", "-"),
    };
    let activity = match sample.activity {
        Some(state) => format!("  {state:?}"),
        None => String::new(),
    };
    let flag = if sample.low_confidence { "  (low signal)" } else { "" };

    format!(
        "#{:<6} {:>7} mm  q={:>3}  v={} mm/s  avg={:.1} mm [{}..{}]{}{}",
        sample.sequence,
        sample.distance_mm(),
        sample.quality(),
        velocity,
        sample.stats.mean_distance_mm,
        sample.stats.min_distance_mm,
        sample.stats.max_distance_mm,
        activity,
        flag
    )
}

/// 运行摘要
pub fn format_summary(snapshot: &ProcessorSnapshot) -> String {
    let mut lines = vec![format!(
        "Processed {} sample(s), discarded {}, {:.1} Hz",
        snapshot.processed, snapshot.discarded, snapshot.measurement_rate_hz
    )];
    if let Some(v) = &snapshot.velocity {
        lines.push(format!(
            "Velocity mm/s: mean {:.1}  min {:.1}  max {:.1}",
            v.mean_mm_s, v.min_mm_s, v.max_mm_s
        ));
    }
    if let Some(efficiency) = snapshot.drill_efficiency_percent {
        lines.push(format!("Drilling time: {efficiency:.1}%"));
    }
    lines.join("\n")
}

/// 在独立线程上打印显示更新，直到收到退出信号
pub fn spawn_printer(feed: DisplayFeed, stop: ShutdownSignal) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("ldm-display".into())
        .spawn(move || {
            while !stop.is_triggered() {
                match feed.recv_timeout(FEED_POLL) {
                    Ok(Some(DisplayUpdate::Sample(sample))) => println!("{}", format_sample(&sample)),
                    Ok(Some(DisplayUpdate::SessionStarted)) => println!("--- new session ---"),
                    Ok(None) => continue,
                    Err(_) => break,
                }
            }
            if feed.dropped() > 0 {
                eprintln!("display skipped {} update(s)", feed.dropped());
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldm_sdk::processing::Processor;
    use ldm_sdk::protocol::MeasurementSample;

    #[test]
    fn test_format_first_sample() {
        let mut processor = Processor::default();
        let sample = processor.process(MeasurementSample::new(0, 1234, 80)).unwrap();
        let line = format_sample(&sample);

        assert!(line.starts_with("#0 "));
        assert!(line.contains("1234 mm"));
        assert!(line.contains("q= 80"));
        assert!(line.contains("v=        - mm/s"));
        assert!(!line.contains("low signal"));
    }

    #[test]
    fn test_format_velocity_and_low_signal() {
        let mut processor = Processor::default();
        processor.process(MeasurementSample::new(0, 1000, 80)).unwrap();
        let sample = processor
            .process(MeasurementSample::new(500_000, 1010, 5))
            .unwrap();
        let line = format_sample(&sample);

        assert!(line.contains("v=    +20.0 mm/s"));
        assert!(line.contains("[1000..1010]"));
        assert!(line.ends_with("(low signal)"));
    }

    #[test]
    fn test_summary() {
        let snapshot = ProcessorSnapshot {
            processed: 12,
            discarded: 1,
            measurement_rate_hz: 10.0,
            ..Default::default()
        };
        assert_eq!(
            format_summary(&snapshot),
            "Processed 12 sample(s), discarded 1, 10.0 Hz"
        );
    }
}
