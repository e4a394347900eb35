//! MQTT 桥接（无人值守模式）
//!
//! 每个周期：连接设备 → 进入连续测量 → 样本经 pipeline 流向 MQTT sink，
//! 直到请求退出或链路中断。链路中断后等待退避时间再开始下一个周期；
//! 连续失败的周期数达到上限时放弃并返回错误。成功进入连续测量的周期会清零失败计数。
//!
//! pipeline 与 MQTT sink 在所有周期之间复用，每次重连由驱动发出新会话标记，
//! 速度序列与节流状态随之重置。

use crate::SdkError;
use crate::config::AppConfig;
use ldm_driver::{DriverError, LaserDevice, MetricsSnapshot};
use ldm_processing::{
    DEFAULT_PIPELINE_CAPACITY, PipelineHandle, ProcessorSnapshot, SampleSink, pipeline_channel,
    spawn_pipeline,
};
use ldm_protocol::MeasureSpeed;
use ldm_sinks::{MqttPublisher, MqttSink, MqttSinkMetrics, MqttSinkStats};
use ldm_transport::{SystemTransportOpener, TransportOpener, TransportTarget};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 检查退出标志与连接状态的周期
const SUPERVISE_INTERVAL: Duration = Duration::from_millis(50);

/// 退出信号（可跨线程共享，例如交给 Ctrl-C 处理器）
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// 运行结束时的统计
#[derive(Debug, Clone)]
pub struct BridgeReport {
    /// 尝试过的周期数（含失败）
    pub cycles: u32,
    /// 成功进入连续测量的周期数
    pub sessions: u32,
    pub device: MetricsSnapshot,
    pub sink: MqttSinkStats,
}

enum CycleEnd {
    Shutdown,
    Lost,
}

/// MQTT 桥接
pub struct MqttBridge {
    target: TransportTarget,
    speed: MeasureSpeed,
    max_attempts: u32,
    backoff: Duration,
    device: Arc<LaserDevice>,
    pipeline: Option<PipelineHandle>,
    sink_metrics: Arc<MqttSinkMetrics>,
    shutdown: ShutdownSignal,
}

impl MqttBridge {
    /// 使用真实传输创建桥接
    ///
    /// `extra_sinks` 与 MQTT sink 挂在同一 pipeline 上（例如控制台显示）。
    pub fn new<P>(
        config: &AppConfig,
        publisher: P,
        extra_sinks: Vec<Box<dyn SampleSink>>,
    ) -> Result<Self, SdkError>
    where
        P: MqttPublisher + 'static,
    {
        Self::with_opener(config, publisher, SystemTransportOpener, extra_sinks)
    }

    /// 连接 `config.mqtt` 指定的 broker 并创建桥接
    #[cfg(feature = "mqtt")]
    pub fn connect_broker(
        config: &AppConfig,
        extra_sinks: Vec<Box<dyn SampleSink>>,
    ) -> Result<Self, SdkError> {
        config.validate()?;
        let publisher = ldm_sinks::RumqttcPublisher::connect(&config.rumqttc_config())?;
        Self::new(config, publisher, extra_sinks)
    }

    pub fn with_opener<P, O>(
        config: &AppConfig,
        publisher: P,
        opener: O,
        extra_sinks: Vec<Box<dyn SampleSink>>,
    ) -> Result<Self, SdkError>
    where
        P: MqttPublisher + 'static,
        O: TransportOpener + 'static,
    {
        config.validate()?;
        let target = config.transport_target()?;

        let sink = MqttSink::spawn(config.mqtt_sink_config(), publisher)?;
        let sink_metrics = sink.metrics();

        let mut sinks: Vec<Box<dyn SampleSink>> = Vec::with_capacity(extra_sinks.len() + 1);
        sinks.push(Box::new(sink));
        sinks.extend(extra_sinks);

        let (samples_tx, samples_rx) = pipeline_channel(DEFAULT_PIPELINE_CAPACITY);
        let pipeline = spawn_pipeline(config.processing_config(), samples_rx, sinks)?;

        let device = LaserDevice::builder()
            .config(config.device_config())
            .opener(opener)
            .pipeline(samples_tx)
            .build()?;

        Ok(Self {
            target,
            speed: config.driver.speed,
            max_attempts: config.reconnect.max_attempts,
            backoff: config.reconnect_backoff(),
            device: Arc::new(device),
            pipeline: Some(pipeline),
            sink_metrics,
            shutdown: ShutdownSignal::new(),
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn device(&self) -> &Arc<LaserDevice> {
        &self.device
    }

    pub fn sink_stats(&self) -> MqttSinkStats {
        self.sink_metrics.snapshot()
    }

    pub fn pipeline_snapshot(&self) -> Option<Arc<ProcessorSnapshot>> {
        self.pipeline.as_ref().map(PipelineHandle::snapshot)
    }

    /// 运行直到退出信号或重连次数耗尽
    ///
    /// # 错误
    /// `SdkError::ReconnectExhausted`：连续 `reconnect.max_attempts` 个周期未能进入连续测量
    pub fn run(&mut self) -> Result<BridgeReport, SdkError> {
        let mut cycles = 0u32;
        let mut sessions = 0u32;
        let mut failures = 0u32;

        info!(
            "MQTT bridge starting on {} (max {} attempt(s), backoff {:?})",
            self.target, self.max_attempts, self.backoff
        );

        while !self.shutdown.is_triggered() {
            cycles += 1;
            match self.run_cycle(&mut sessions) {
                Ok(CycleEnd::Shutdown) => break,
                Ok(CycleEnd::Lost) => {
                    failures = 0;
                    warn!("Connection to {} lost, reconnecting in {:?}", self.target, self.backoff);
                },
                Err(e) => {
                    failures += 1;
                    warn!(
                        "Connection cycle failed ({}/{}): {}",
                        failures, self.max_attempts, e
                    );
                    if failures >= self.max_attempts {
                        error!("Giving up on {} after {} failed attempt(s)", self.target, failures);
                        return Err(SdkError::ReconnectExhausted {
                            attempts: failures,
                            last_error: e.to_string(),
                        });
                    }
                },
            }
            self.wait_backoff();
        }

        info!("MQTT bridge stopped after {} cycle(s)", cycles);
        Ok(BridgeReport {
            cycles,
            sessions,
            device: self.device.metrics().snapshot(),
            sink: self.sink_metrics.snapshot(),
        })
    }

    fn run_cycle(&self, sessions: &mut u32) -> Result<CycleEnd, DriverError> {
        self.device.connect(self.target.clone())?;
        if let Err(e) = self.device.start_continuous(self.speed) {
            self.device.disconnect();
            return Err(e);
        }
        *sessions += 1;
        info!("Streaming measurements from {}", self.target);

        loop {
            if self.shutdown.is_triggered() {
                if let Err(e) = self.device.stop_continuous() {
                    debug!("Stop continuous during shutdown failed: {}", e);
                }
                self.device.disconnect();
                return Ok(CycleEnd::Shutdown);
            }
            if !self.device.is_connected() {
                // 释放已失效的会话
                self.device.disconnect();
                return Ok(CycleEnd::Lost);
            }
            thread::sleep(SUPERVISE_INTERVAL);
        }
    }

    fn wait_backoff(&self) {
        let deadline = Instant::now() + self.backoff;
        while !self.shutdown.is_triggered() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SUPERVISE_INTERVAL));
        }
    }
}

impl Drop for MqttBridge {
    fn drop(&mut self) {
        self.device.disconnect();
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.shutdown();
        }
    }
}
