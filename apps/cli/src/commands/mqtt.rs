//! MQTT 桥接命令
//!
//! 无人值守模式：连续测量，节流后发布到 broker。链路中断时按配置重连，
//! 连续失败次数耗尽后以非零状态退出。

use crate::args::{SpeedArg, TransportArgs};
use crate::commands::config::load_config;
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use ldm_sdk::AppConfig;
use ldm_sdk::sinks::{PayloadFormat, PublishPolicy};
use std::path::Path;
use std::time::Duration;

/// 载荷格式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Full,
    Minimal,
}

impl From<FormatArg> for PayloadFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Full => PayloadFormat::Full,
            FormatArg::Minimal => PayloadFormat::Minimal,
        }
    }
}

/// MQTT 命令参数
#[derive(Args, Debug, Default)]
pub struct MqttCommand {
    #[command(flatten)]
    pub transport: TransportArgs,

    /// Broker 地址
    #[arg(long)]
    pub host: Option<String>,

    /// Broker 端口
    #[arg(long)]
    pub mqtt_port: Option<u16>,

    /// 发布主题
    #[arg(short, long)]
    pub topic: Option<String>,

    /// 发布间隔（毫秒）
    #[arg(long, conflicts_with = "every")]
    pub interval_ms: Option<u64>,

    /// 每 N 个样本发布一次
    #[arg(long)]
    pub every: Option<u32>,

    /// 载荷格式
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// 测量速度
    #[arg(short, long, value_enum)]
    pub speed: Option<SpeedArg>,

    /// 同时在控制台显示样本
    #[arg(long)]
    pub display: bool,
}

impl MqttCommand {
    /// 命令行参数覆盖配置
    pub fn apply(&self, config: &mut AppConfig) {
        self.transport.apply(config);
        let mqtt = &mut config.mqtt;
        if let Some(host) = &self.host {
            mqtt.host = host.clone();
        }
        if let Some(port) = self.mqtt_port {
            mqtt.port = port;
        }
        if let Some(topic) = &self.topic {
            mqtt.topic = topic.clone();
        }
        if let Some(ms) = self.interval_ms {
            mqtt.publish = PublishPolicy::Interval(Duration::from_millis(ms));
        }
        if let Some(n) = self.every {
            mqtt.publish = PublishPolicy::EveryNth(n);
        }
        if let Some(format) = self.format {
            mqtt.format = format.into();
        }
        if let Some(speed) = self.speed {
            config.driver.speed = speed.into();
        }
    }

    pub fn execute(&self, config_path: &Path) -> Result<()> {
        let mut config = load_config(config_path)?;
        self.apply(&mut config);
        config.validate()?;
        self.run(&config)
    }

    #[cfg(feature = "mqtt")]
    fn run(&self, config: &AppConfig) -> Result<()> {
        use crate::display::{format_summary, spawn_printer};
        use ldm_sdk::MqttBridge;
        use ldm_sdk::processing::SampleSink;
        use ldm_sdk::sinks::{DEFAULT_DISPLAY_CAPACITY, display_channel};

        let mut extra_sinks: Vec<Box<dyn SampleSink>> = Vec::new();
        let mut feed = None;
        if self.display {
            let (sink, display_feed) = display_channel(DEFAULT_DISPLAY_CAPACITY);
            extra_sinks.push(Box::new(sink));
            feed = Some(display_feed);
        }

        let mut bridge = MqttBridge::connect_broker(config, extra_sinks).with_context(|| {
            format!("连接 MQTT broker {}:{} 失败", config.mqtt.host, config.mqtt.port)
        })?;
        let shutdown = bridge.shutdown_signal();
        let signal = shutdown.clone();
        ctrlc::set_handler(move || signal.trigger()).context("设置 Ctrl-C 处理器失败")?;

        let printer = match feed {
            Some(feed) => Some(spawn_printer(feed, shutdown.clone())?),
            None => None,
        };

        eprintln!(
            "📡 发布到 {}:{} '{}'（{}），Ctrl-C 退出",
            config.mqtt.host, config.mqtt.port, config.mqtt.topic, config.mqtt.publish
        );
        let result = bridge.run();
        shutdown.trigger();
        if let Some(printer) = printer {
            let _ = printer.join();
        }
        if let Some(snapshot) = bridge.pipeline_snapshot() {
            println!("{}", format_summary(&snapshot));
        }

        let report = result?;
        println!(
            "Sessions: {}  published: {}  throttled: {}  dropped: {}  failed: {}",
            report.sessions,
            report.sink.published,
            report.sink.throttled,
            report.sink.dropped,
            report.sink.failed
        );
        Ok(())
    }

    #[cfg(not(feature = "mqtt"))]
    fn run(&self, _config: &AppConfig) -> Result<()> {
        anyhow::bail!("ldm-cli 构建时未启用 mqtt feature")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let mut config = AppConfig::default();
        let cmd = MqttCommand {
            host: Some("10.0.0.5".to_string()),
            mqtt_port: Some(1884),
            topic: Some("lab/rig1".to_string()),
            interval_ms: Some(250),
            format: Some(FormatArg::Minimal),
            ..Default::default()
        };
        cmd.apply(&mut config);

        assert_eq!(config.mqtt.host, "10.0.0.5");
        assert_eq!(config.mqtt.port, 1884);
        assert_eq!(config.mqtt.topic, "lab/rig1");
        assert_eq!(
            config.mqtt.publish,
            PublishPolicy::Interval(Duration::from_millis(250))
        );
        assert_eq!(config.mqtt.format, PayloadFormat::Minimal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_every_nth_override() {
        let mut config = AppConfig::default();
        let cmd = MqttCommand {
            every: Some(0),
            ..Default::default()
        };
        cmd.apply(&mut config);
        assert_eq!(config.mqtt.publish, PublishPolicy::EveryNth(0));
        assert!(config.validate().is_err());
    }
}
