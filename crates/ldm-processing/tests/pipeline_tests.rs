//! Pipeline 工作线程测试
//!
//! 验证：
//! - 输出顺序与输入顺序严格一致（即使 sink 很慢）
//! - 非法样本被丢弃并产生诊断事件，线程继续工作
//! - 新会话重置速度序列

use crossbeam_channel::{Receiver, Sender, unbounded};
use ldm_processing::{
    PipelineEvent, PipelineInput, ProcessedSample, ProcessingConfig, SampleSink,
    pipeline_channel, spawn_pipeline,
};
use ldm_protocol::MeasurementSample;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SEC: u64 = 1_000_000;

struct CollectSink {
    tx: Sender<Arc<ProcessedSample>>,
    delay: Duration,
}

impl SampleSink for CollectSink {
    fn name(&self) -> &str {
        "collect"
    }

    fn accept(&mut self, sample: &Arc<ProcessedSample>) {
        thread::sleep(self.delay);
        let _ = self.tx.send(sample.clone());
    }
}

fn collect_sink(delay: Duration) -> (Box<dyn SampleSink>, Receiver<Arc<ProcessedSample>>) {
    let (tx, rx) = unbounded();
    (Box::new(CollectSink { tx, delay }), rx)
}

fn recv(rx: &Receiver<Arc<ProcessedSample>>) -> Arc<ProcessedSample> {
    rx.recv_timeout(Duration::from_secs(2)).expect("processed sample")
}

#[test]
fn test_order_preserved_with_slow_sink() {
    let (input_tx, input_rx) = pipeline_channel(4);
    let (sink, output) = collect_sink(Duration::from_millis(5));
    let handle = spawn_pipeline(ProcessingConfig::default(), input_rx, vec![sink]).unwrap();

    for i in 0..20u64 {
        input_tx
            .send(PipelineInput::Sample(MeasurementSample::new(
                i * SEC / 10,
                1000 + i as u32,
                90,
            )))
            .unwrap();
    }

    let distances: Vec<u32> = (0..20).map(|_| recv(&output).distance_mm()).collect();
    assert_eq!(distances, (1000..1020).collect::<Vec<_>>());

    drop(input_tx);
    handle.shutdown();
}

#[test]
fn test_continuous_velocity_scenario() {
    let (input_tx, input_rx) = pipeline_channel(16);
    let (sink, output) = collect_sink(Duration::ZERO);
    let _handle = spawn_pipeline(ProcessingConfig::default(), input_rx, vec![sink]).unwrap();

    for (t, d) in [(0, 1000), (SEC, 1010), (2 * SEC, 1005)] {
        input_tx
            .send(PipelineInput::Sample(MeasurementSample::new(t, d, 80)))
            .unwrap();
    }

    let velocities: Vec<_> = (0..3).map(|_| recv(&output).velocity_mm_s).collect();
    assert_eq!(velocities, vec![None, Some(10.0), Some(-5.0)]);
}

#[test]
fn test_malformed_sample_is_discarded() {
    let (input_tx, input_rx) = pipeline_channel(16);
    let (sink, output) = collect_sink(Duration::ZERO);
    let handle = spawn_pipeline(ProcessingConfig::default(), input_rx, vec![sink]).unwrap();

    input_tx
        .send(PipelineInput::Sample(MeasurementSample::new(SEC, 1000, 80)))
        .unwrap();
    // 时间戳倒退
    input_tx
        .send(PipelineInput::Sample(MeasurementSample::new(0, 999, 80)))
        .unwrap();
    input_tx
        .send(PipelineInput::Sample(MeasurementSample::new(2 * SEC, 1010, 80)))
        .unwrap();

    assert_eq!(recv(&output).distance_mm(), 1000);
    let third = recv(&output);
    assert_eq!(third.distance_mm(), 1010);
    assert_eq!(third.velocity_mm_s, Some(10.0));

    let event = handle
        .events()
        .recv_timeout(Duration::from_secs(1))
        .unwrap();
    assert!(matches!(event, PipelineEvent::Discarded { sample, .. } if sample.distance_mm == 999));

    // 快照在 sink 之后发布
    let mut snapshot = handle.snapshot();
    for _ in 0..100 {
        if snapshot.processed == 2 {
            break;
        }
        thread::sleep(Duration::from_millis(5));
        snapshot = handle.snapshot();
    }
    assert_eq!(snapshot.processed, 2);
    assert_eq!(snapshot.discarded, 1);
}

#[test]
fn test_session_start_resets_velocity() {
    let (input_tx, input_rx) = pipeline_channel(16);
    let (sink, output) = collect_sink(Duration::ZERO);
    let _handle = spawn_pipeline(ProcessingConfig::default(), input_rx, vec![sink]).unwrap();

    input_tx
        .send(PipelineInput::Sample(MeasurementSample::new(0, 1000, 80)))
        .unwrap();
    input_tx
        .send(PipelineInput::Sample(MeasurementSample::new(SEC, 1010, 80)))
        .unwrap();
    input_tx.send(PipelineInput::SessionStart).unwrap();
    input_tx
        .send(PipelineInput::Sample(MeasurementSample::new(SEC + 1, 1500, 80)))
        .unwrap();

    recv(&output);
    assert_eq!(recv(&output).velocity_mm_s, Some(10.0));
    let after = recv(&output);
    assert_eq!(after.velocity_mm_s, None);
    assert_eq!(after.sequence, 0);
    assert_eq!(after.stats.mean_distance_mm, 1500.0);
}
