//! Pipeline 工作线程模块
//!
//! 单消费者工作线程：从有界队列按到达顺序取出测量样本，经 [`Processor`] 处理后
//! 依次交给所有 [`SampleSink`]。非法样本被丢弃并发出诊断事件，不会中断线程。

use crate::processor::{ProcessedSample, ProcessingConfig, Processor};
use crate::velocity::VelocityStats;
use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use ldm_protocol::MeasurementSample;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// 默认输入队列容量
pub const DEFAULT_PIPELINE_CAPACITY: usize = 256;

/// 工作线程检查停止标志的周期
const WORKER_POLL: Duration = Duration::from_millis(50);

/// Pipeline 输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineInput {
    Sample(MeasurementSample),
    /// 新会话开始（重连后速度序列与窗口重置）
    SessionStart,
}

/// 诊断事件
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// 样本被丢弃
    Discarded {
        sample: MeasurementSample,
        reason: String,
    },
    SessionStarted,
}

/// 处理后样本的消费者
///
/// `accept` 在 pipeline 线程上调用，实现不得阻塞（使用有界队列并明确溢出策略）。
pub trait SampleSink: Send {
    fn name(&self) -> &str;

    fn accept(&mut self, sample: &Arc<ProcessedSample>);

    fn on_session_start(&mut self) {}

    /// pipeline 退出前调用
    fn flush(&mut self) {}
}

/// 处理器状态快照（无锁读取）
#[derive(Debug, Clone, Default)]
pub struct ProcessorSnapshot {
    pub processed: u64,
    pub discarded: u64,
    pub last: Option<Arc<ProcessedSample>>,
    pub velocity: Option<VelocityStats>,
    pub drill_efficiency_percent: Option<f64>,
    pub measurement_rate_hz: f64,
}

/// 创建 pipeline 输入队列
pub fn pipeline_channel(capacity: usize) -> (Sender<PipelineInput>, Receiver<PipelineInput>) {
    bounded(capacity.max(1))
}

/// Pipeline 句柄
///
/// Drop 时停止工作线程并等待其退出。
pub struct PipelineHandle {
    is_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    snapshot: Arc<ArcSwap<ProcessorSnapshot>>,
    events: Receiver<PipelineEvent>,
}

impl PipelineHandle {
    /// 当前快照
    pub fn snapshot(&self) -> Arc<ProcessorSnapshot> {
        self.snapshot.load_full()
    }

    /// 诊断事件
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// 停止并等待工作线程退出
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.is_running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            warn!("pipeline worker panicked");
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 启动 pipeline 工作线程
///
/// # 参数
/// - `config`: 处理配置
/// - `input`: 输入队列（所有发送端关闭后线程在处理完剩余样本后退出）
/// - `sinks`: 消费者，按顺序调用
///
/// # 错误
/// 线程创建失败时返回 IO 错误
pub fn spawn_pipeline(
    config: ProcessingConfig,
    input: Receiver<PipelineInput>,
    sinks: Vec<Box<dyn SampleSink>>,
) -> std::io::Result<PipelineHandle> {
    let is_running = Arc::new(AtomicBool::new(true));
    let snapshot = Arc::new(ArcSwap::from_pointee(ProcessorSnapshot::default()));
    let (event_tx, event_rx) = bounded(DEFAULT_PIPELINE_CAPACITY);

    let worker = PipelineWorker {
        processor: Processor::new(config),
        sinks,
        snapshot: snapshot.clone(),
        events: event_tx,
        processed: 0,
        discarded: 0,
    };
    let running = is_running.clone();
    let thread = thread::Builder::new()
        .name("ldm-pipeline".into())
        .spawn(move || worker.run(input, running))?;

    Ok(PipelineHandle {
        is_running,
        thread: Some(thread),
        snapshot,
        events: event_rx,
    })
}

struct PipelineWorker {
    processor: Processor,
    sinks: Vec<Box<dyn SampleSink>>,
    snapshot: Arc<ArcSwap<ProcessorSnapshot>>,
    events: Sender<PipelineEvent>,
    processed: u64,
    discarded: u64,
}

impl PipelineWorker {
    fn run(mut self, input: Receiver<PipelineInput>, is_running: Arc<AtomicBool>) {
        debug!("pipeline worker started");
        while is_running.load(Ordering::Acquire) {
            match input.recv_timeout(WORKER_POLL) {
                Ok(PipelineInput::Sample(sample)) => self.handle_sample(sample),
                Ok(PipelineInput::SessionStart) => self.handle_session_start(),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        for sink in &mut self.sinks {
            sink.flush();
        }
        debug!(
            "pipeline worker stopped ({} processed, {} discarded)",
            self.processed, self.discarded
        );
    }

    fn handle_sample(&mut self, sample: MeasurementSample) {
        match self.processor.process(sample) {
            Ok(processed) => {
                self.processed += 1;
                let processed = Arc::new(processed);
                trace!(
                    "sample #{} {} mm v={:?}",
                    processed.sequence, processed.sample.distance_mm, processed.velocity_mm_s
                );
                for sink in &mut self.sinks {
                    sink.accept(&processed);
                }
                self.publish_snapshot(Some(processed));
            },
            Err(e) => {
                self.discarded += 1;
                warn!("Discarding measurement sample: {}", e);
                self.emit(PipelineEvent::Discarded {
                    sample,
                    reason: e.to_string(),
                });
                self.publish_snapshot(None);
            },
        }
    }

    fn handle_session_start(&mut self) {
        debug!("pipeline: new session");
        self.processor.reset();
        for sink in &mut self.sinks {
            sink.on_session_start();
        }
        self.emit(PipelineEvent::SessionStarted);
        self.publish_snapshot(None);
    }

    fn publish_snapshot(&self, last: Option<Arc<ProcessedSample>>) {
        let previous = self.snapshot.load();
        self.snapshot.store(Arc::new(ProcessorSnapshot {
            processed: self.processed,
            discarded: self.discarded,
            last: last.or_else(|| previous.last.clone()),
            velocity: self.processor.velocity_stats(),
            drill_efficiency_percent: self.processor.drill_efficiency_percent(),
            measurement_rate_hz: self.processor.measurement_rate_hz(),
        }));
    }

    fn emit(&self, event: PipelineEvent) {
        if let Err(TrySendError::Full(_)) = self.events.try_send(event) {
            trace!("pipeline event queue full, event dropped");
        }
    }
}
