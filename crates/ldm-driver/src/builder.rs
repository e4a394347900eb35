//! Builder 模式实现
//!
//! 提供链式构造 [`LaserDevice`] 的便捷方式。

use crate::device::{CodecFactory, DeviceConfig, LaserDevice, meskernel_codec};
use crate::error::DriverError;
use crate::hooks::{FrameObserver, HookManager};
use crossbeam_channel::Sender;
use ldm_processing::PipelineInput;
use ldm_transport::{SystemTransportOpener, TransportOpener};
use std::sync::Arc;
use std::time::Duration;

/// LaserDevice Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use ldm_driver::DeviceBuilder;
/// use ldm_transport::TransportTarget;
/// use std::time::Duration;
///
/// let device = DeviceBuilder::new()
///     .command_timeout(Duration::from_secs(1))
///     .retries(1)
///     .build()
///     .unwrap();
/// device.connect(TransportTarget::serial("/dev/ttyUSB0", 115_200)).unwrap();
/// ```
pub struct DeviceBuilder {
    config: DeviceConfig,
    opener: Option<Arc<dyn TransportOpener>>,
    codec: Option<CodecFactory>,
    samples: Option<Sender<PipelineInput>>,
    hooks: HookManager,
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self {
            config: DeviceConfig::default(),
            opener: None,
            codec: None,
            samples: None,
            hooks: HookManager::new(),
        }
    }

    /// 整体替换配置
    pub fn config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }

    /// 单次等待响应的时间（默认 2s）
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// 超时重试次数（默认 2）
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// 是否在连接时读取状态作为握手（默认开启）
    pub fn handshake(mut self, enabled: bool) -> Self {
        self.config.handshake = enabled;
        self
    }

    pub fn command_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.command_queue_capacity = capacity;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// 传输工厂（默认打开真实设备）
    pub fn opener(mut self, opener: impl TransportOpener + 'static) -> Self {
        self.opener = Some(Arc::new(opener));
        self
    }

    /// 编解码器工厂（默认 Meskernel 协议）
    pub fn codec(mut self, codec: CodecFactory) -> Self {
        self.codec = Some(codec);
        self
    }

    /// 测量样本输出队列（通常来自 `ldm_processing::pipeline_channel`）
    pub fn pipeline(mut self, samples: Sender<PipelineInput>) -> Self {
        self.samples = Some(samples);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn FrameObserver>) -> Self {
        self.hooks.add_observer(observer);
        self
    }

    /// 构建驱动（不打开传输）
    ///
    /// # 错误
    /// 配置非法时返回 `DriverError::Configuration`
    pub fn build(self) -> Result<LaserDevice, DriverError> {
        self.config.validate()?;
        Ok(LaserDevice::new(
            self.config,
            self.opener
                .unwrap_or_else(|| Arc::new(SystemTransportOpener)),
            self.codec.unwrap_or_else(meskernel_codec),
            self.samples,
            self.hooks,
        ))
    }
}

impl Default for DeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let device = DeviceBuilder::new().build().unwrap();
        assert_eq!(device.config(), &DeviceConfig::default());
        assert!(!device.is_connected());
    }

    #[test]
    fn test_builder_chain() {
        let device = DeviceBuilder::new()
            .command_timeout(Duration::from_millis(300))
            .retries(0)
            .handshake(false)
            .build()
            .unwrap();
        assert_eq!(device.config().command_timeout, Duration::from_millis(300));
        assert_eq!(device.config().retries, 0);
        assert!(!device.config().handshake);
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = DeviceBuilder::new().retries(100).build();
        assert!(matches!(result, Err(DriverError::Configuration(_))));
    }
}
