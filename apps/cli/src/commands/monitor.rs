//! 监控命令
//!
//! 进入连续测量，在控制台逐条显示距离、速度与滚动统计，Ctrl-C 退出。
//! 链路中断时结束（需要自动重连请使用 `mqtt` 命令）。

use crate::args::{SpeedArg, TransportArgs};
use crate::commands::config::load_config;
use crate::display::{format_summary, spawn_printer};
use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::Receiver;
use ldm_sdk::driver::{TrafficRecord, TrafficRecorder};
use ldm_sdk::processing::{
    CsvSink, DEFAULT_PIPELINE_CAPACITY, SampleSink, pipeline_channel, spawn_pipeline,
};
use ldm_sdk::protocol::MeasureSpeed;
use ldm_sdk::sinks::{DEFAULT_DISPLAY_CAPACITY, display_channel};
use ldm_sdk::{LaserDevice, ShutdownSignal};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::warn;

const SUPERVISE_INTERVAL: Duration = Duration::from_millis(100);

/// 监控命令参数
#[derive(Args, Debug)]
pub struct MonitorCommand {
    #[command(flatten)]
    pub transport: TransportArgs,

    /// 测量速度（覆盖配置）
    #[arg(short, long, value_enum)]
    pub speed: Option<SpeedArg>,

    /// 监控时长（秒），0 表示直到 Ctrl-C
    #[arg(short, long, default_value_t = 0)]
    pub duration: u64,

    /// 同时把处理后的样本写入 CSV 文件
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// 以十六进制打印收发的每一帧（stderr）
    #[arg(long)]
    pub trace_frames: bool,
}

impl MonitorCommand {
    pub fn execute(&self, config_path: &Path) -> Result<()> {
        let mut config = load_config(config_path)?;
        self.transport.apply(&mut config);
        config.validate()?;
        let target = config.transport_target()?;
        let speed = self.speed.map_or(config.driver.speed, MeasureSpeed::from);

        let shutdown = ShutdownSignal::new();
        let signal = shutdown.clone();
        ctrlc::set_handler(move || signal.trigger()).context("设置 Ctrl-C 处理器失败")?;

        // 处理层：显示 + 可选 CSV
        let (display, feed) = display_channel(DEFAULT_DISPLAY_CAPACITY);
        let mut sinks: Vec<Box<dyn SampleSink>> = vec![Box::new(display)];
        if let Some(path) = &self.csv {
            let file = File::create(path)
                .with_context(|| format!("创建 CSV 文件失败: {}", path.display()))?;
            sinks.push(Box::new(CsvSink::new(BufWriter::new(file))));
        }
        let (samples_tx, samples_rx) = pipeline_channel(DEFAULT_PIPELINE_CAPACITY);
        let pipeline = spawn_pipeline(config.processing_config(), samples_rx, sinks)?;

        let mut builder = LaserDevice::builder()
            .config(config.device_config())
            .pipeline(samples_tx);
        let mut tracer = None;
        if self.trace_frames {
            let (recorder, records) = TrafficRecorder::new();
            builder = builder.observer(Arc::new(recorder));
            tracer = Some(spawn_tracer(records, shutdown.clone())?);
        }
        let device = builder.build()?;

        let printer = spawn_printer(feed, shutdown.clone())?;

        let result = self.stream(&device, target, speed, &shutdown);
        shutdown.trigger();
        device.disconnect();
        drop(device);

        let _ = printer.join();
        if let Some(tracer) = tracer {
            let _ = tracer.join();
        }

        let snapshot = pipeline.snapshot();
        pipeline.shutdown();
        println!("{}", format_summary(&snapshot));
        result
    }

    fn stream(
        &self,
        device: &LaserDevice,
        target: ldm_sdk::TransportTarget,
        speed: MeasureSpeed,
        shutdown: &ShutdownSignal,
    ) -> Result<()> {
        device
            .connect(target.clone())
            .with_context(|| format!("连接 {} 失败", target))?;
        device.start_continuous(speed)?;
        eprintln!("📡 {} 连续测量中（{:?}），Ctrl-C 退出", target, speed);

        let deadline = (self.duration > 0)
            .then(|| Instant::now() + Duration::from_secs(self.duration));
        while !shutdown.is_triggered() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            if !device.is_connected() {
                warn!("Connection to {} lost", target);
                anyhow::bail!("与 {} 的连接中断", target);
            }
            thread::sleep(SUPERVISE_INTERVAL);
        }

        if let Err(e) = device.stop_continuous() {
            warn!("Failed to stop continuous measurement: {}", e);
        }
        Ok(())
    }
}

/// 帧跟踪输出线程
fn spawn_tracer(
    records: Receiver<TrafficRecord>,
    stop: ShutdownSignal,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("ldm-trace".into()).spawn(move || {
        while !stop.is_triggered() {
            if let Ok(record) = records.recv_timeout(SUPERVISE_INTERVAL) {
                eprintln!("{}", record);
            }
        }
        for record in records.try_iter() {
            eprintln!("{}", record);
        }
    })
}
