//! MQTT 发布 sink
//!
//! 每个处理后样本依次经过：
//! 1. 低置信度过滤（`suppress_low_confidence`）
//! 2. 节流（[`PublishThrottle`]）
//! 3. 序列化为 JSON 载荷，放入有界队列
//!
//! 独立的发布线程从队列取出消息交给 [`MqttPublisher`]。
//! 队列满时丢弃最新消息并计数，pipeline 线程永远不会被 broker 拖慢。

use crate::SinkError;
use crate::payload::{MqttPayload, PayloadFormat};
use crate::publisher::{MqttMessage, MqttPublisher, QosLevel};
use crate::throttle::{PublishPolicy, PublishThrottle};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use ldm_processing::{ProcessedSample, SampleSink};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// 默认发布主题
pub const DEFAULT_MQTT_TOPIC: &str = "sensor/meskernel/distance";

/// 默认发布队列容量
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// MQTT sink 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSinkConfig {
    pub topic: String,
    pub qos: QosLevel,
    pub retain: bool,
    pub publish: PublishPolicy,
    pub format: PayloadFormat,
    /// 不发布低置信度样本
    pub suppress_low_confidence: bool,
    /// 发布线程队列容量
    pub queue_capacity: usize,
}

impl Default for MqttSinkConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_MQTT_TOPIC.to_string(),
            qos: QosLevel::AtMostOnce,
            retain: false,
            publish: PublishPolicy::default(),
            format: PayloadFormat::Full,
            suppress_low_confidence: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl MqttSinkConfig {
    pub fn validate(&self) -> Result<(), SinkError> {
        if self.topic.is_empty() {
            return Err(SinkError::Configuration("MQTT topic is empty".to_string()));
        }
        if self.topic.contains(['+', '#', '\0']) {
            return Err(SinkError::Configuration(format!(
                "MQTT topic '{}' must not contain wildcards",
                self.topic
            )));
        }
        self.publish.validate().map_err(SinkError::Configuration)?;
        if self.queue_capacity == 0 {
            return Err(SinkError::Configuration(
                "MQTT queue capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// MQTT sink 计数器
#[derive(Debug, Default)]
pub struct MqttSinkMetrics {
    /// 收到的样本数
    pub received: AtomicU64,
    /// 低置信度被过滤的样本数
    pub suppressed: AtomicU64,
    /// 被节流跳过的样本数
    pub throttled: AtomicU64,
    /// 队列满被丢弃的消息数
    pub dropped: AtomicU64,
    /// 发布器接受的消息数
    pub published: AtomicU64,
    /// 序列化或发布失败的消息数
    pub failed: AtomicU64,
}

impl MqttSinkMetrics {
    pub fn snapshot(&self) -> MqttSinkStats {
        MqttSinkStats {
            received: self.received.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 计数器快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MqttSinkStats {
    pub received: u64,
    pub suppressed: u64,
    pub throttled: u64,
    pub dropped: u64,
    pub published: u64,
    pub failed: u64,
}

/// MQTT 发布 sink
pub struct MqttSink {
    config: MqttSinkConfig,
    throttle: PublishThrottle,
    tx: Option<Sender<MqttMessage>>,
    worker: Option<JoinHandle<()>>,
    metrics: Arc<MqttSinkMetrics>,
}

impl MqttSink {
    /// 启动发布线程
    pub fn spawn<P>(config: MqttSinkConfig, publisher: P) -> Result<Self, SinkError>
    where
        P: MqttPublisher + 'static,
    {
        config.validate()?;

        let (tx, rx) = bounded(config.queue_capacity);
        let metrics = Arc::new(MqttSinkMetrics::default());
        let metrics_clone = metrics.clone();

        let worker = thread::Builder::new()
            .name("ldm-mqtt-publish".into())
            .spawn(move || run_publisher(publisher, rx, metrics_clone))?;

        info!(
            "MQTT sink publishing to '{}' {} (qos {})",
            config.topic,
            config.publish,
            u8::from(config.qos)
        );

        Ok(Self {
            throttle: PublishThrottle::new(config.publish),
            config,
            tx: Some(tx),
            worker: Some(worker),
            metrics,
        })
    }

    pub fn config(&self) -> &MqttSinkConfig {
        &self.config
    }

    /// 计数器句柄（sink 移交给 pipeline 后仍可读取）
    pub fn metrics(&self) -> Arc<MqttSinkMetrics> {
        self.metrics.clone()
    }

    pub fn stats(&self) -> MqttSinkStats {
        self.metrics.snapshot()
    }

    fn enqueue(&mut self, sample: &ProcessedSample) {
        let payload = match MqttPayload::from_sample(sample).to_json(self.config.format) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize MQTT payload: {}", e);
                MqttSinkMetrics::bump(&self.metrics.failed);
                return;
            },
        };
        let message = MqttMessage {
            topic: self.config.topic.clone(),
            payload,
            qos: self.config.qos,
            retain: self.config.retain,
        };

        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        match tx.try_send(message) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                MqttSinkMetrics::bump(&self.metrics.dropped);
                debug!("MQTT publish queue full, dropping sample #{}", sample.sequence);
            },
            Err(TrySendError::Disconnected(_)) => {
                MqttSinkMetrics::bump(&self.metrics.dropped);
                warn!("MQTT publish worker exited, further samples are dropped");
                self.tx = None;
            },
        }
    }
}

impl SampleSink for MqttSink {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn accept(&mut self, sample: &Arc<ProcessedSample>) {
        MqttSinkMetrics::bump(&self.metrics.received);

        if self.config.suppress_low_confidence && sample.low_confidence {
            MqttSinkMetrics::bump(&self.metrics.suppressed);
            return;
        }
        if !self.throttle.should_publish(sample.sample.timestamp_us) {
            MqttSinkMetrics::bump(&self.metrics.throttled);
            return;
        }
        self.enqueue(sample);
    }

    fn on_session_start(&mut self) {
        self.throttle.reset();
    }
}

impl Drop for MqttSink {
    fn drop(&mut self) {
        // 关闭队列，发布线程处理完剩余消息后退出
        self.tx = None;
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            warn!("MQTT publish worker panicked");
        }
    }
}

fn run_publisher<P: MqttPublisher>(
    mut publisher: P,
    rx: Receiver<MqttMessage>,
    metrics: Arc<MqttSinkMetrics>,
) {
    let mut failing = false;
    for message in rx.iter() {
        match publisher.publish(message) {
            Ok(()) => {
                MqttSinkMetrics::bump(&metrics.published);
                if failing {
                    info!("MQTT publishing resumed");
                    failing = false;
                }
            },
            Err(e) => {
                MqttSinkMetrics::bump(&metrics.failed);
                // 只在开始失败时记录一次
                if !failing {
                    warn!("MQTT publish failed: {}", e);
                    failing = true;
                }
            },
        }
    }
    publisher.disconnect();
    debug!("MQTT publish worker exiting");
}
