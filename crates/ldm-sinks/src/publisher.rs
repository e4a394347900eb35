//! MQTT 发布器
//!
//! [`MqttPublisher`] 是发布 sink 与具体 MQTT 客户端之间的接口。
//! 默认实现 [`RumqttcPublisher`] 基于 `rumqttc` 同步客户端，
//! 其事件循环运行在独立线程上，负责连接、重连与错误日志。

use crate::SinkError;
use serde::{Deserialize, Serialize};

/// QoS 等级
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QosLevel {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl TryFrom<u8> for QosLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QosLevel::AtMostOnce),
            1 => Ok(QosLevel::AtLeastOnce),
            2 => Ok(QosLevel::ExactlyOnce),
            other => Err(format!("invalid MQTT QoS level {} (expected 0, 1 or 2)", other)),
        }
    }
}

impl From<QosLevel> for u8 {
    fn from(qos: QosLevel) -> u8 {
        match qos {
            QosLevel::AtMostOnce => 0,
            QosLevel::AtLeastOnce => 1,
            QosLevel::ExactlyOnce => 2,
        }
    }
}

/// 待发布消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QosLevel,
    pub retain: bool,
}

/// MQTT 发布器
///
/// 在发布 sink 的工作线程上调用，允许短暂阻塞。
pub trait MqttPublisher: Send {
    fn publish(&mut self, message: MqttMessage) -> Result<(), SinkError>;

    /// Broker 连接是否已建立（未知时返回 `true`）
    fn is_connected(&self) -> bool {
        true
    }

    /// 工作线程退出前调用
    fn disconnect(&mut self) {}
}

impl<P: MqttPublisher + ?Sized> MqttPublisher for Box<P> {
    fn publish(&mut self, message: MqttMessage) -> Result<(), SinkError> {
        (**self).publish(message)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }
}

#[cfg(feature = "mqtt")]
pub use self::rumqttc_impl::{RumqttcConfig, RumqttcPublisher};

#[cfg(feature = "mqtt")]
mod rumqttc_impl {
    use super::{MqttMessage, MqttPublisher, QosLevel};
    use crate::SinkError;
    use crossbeam_channel::bounded;
    use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tracing::{debug, info, warn};

    /// 连接失败后的重试间隔
    const RECONNECT_DELAY: Duration = Duration::from_secs(1);

    /// 退出时等待事件循环线程的时间
    const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

    impl From<QosLevel> for QoS {
        fn from(qos: QosLevel) -> QoS {
            match qos {
                QosLevel::AtMostOnce => QoS::AtMostOnce,
                QosLevel::AtLeastOnce => QoS::AtLeastOnce,
                QosLevel::ExactlyOnce => QoS::ExactlyOnce,
            }
        }
    }

    /// Broker 连接参数
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RumqttcConfig {
        pub host: String,
        pub port: u16,
        pub client_id: String,
        pub keep_alive: Duration,
        /// 客户端请求队列容量
        pub request_capacity: usize,
    }

    impl Default for RumqttcConfig {
        fn default() -> Self {
            Self {
                host: "localhost".to_string(),
                port: 1883,
                client_id: "ldm-publisher".to_string(),
                keep_alive: Duration::from_secs(30),
                request_capacity: 10,
            }
        }
    }

    impl RumqttcConfig {
        pub fn validate(&self) -> Result<(), SinkError> {
            if self.host.trim().is_empty() {
                return Err(SinkError::Configuration("MQTT host is empty".to_string()));
            }
            if self.port == 0 {
                return Err(SinkError::Configuration("MQTT port must not be 0".to_string()));
            }
            if self.client_id.is_empty() {
                return Err(SinkError::Configuration("MQTT client id is empty".to_string()));
            }
            if self.keep_alive < Duration::from_secs(1) {
                return Err(SinkError::Configuration(
                    "MQTT keep-alive must be at least 1 s".to_string(),
                ));
            }
            if self.request_capacity == 0 {
                return Err(SinkError::Configuration(
                    "MQTT request capacity must be greater than zero".to_string(),
                ));
            }
            Ok(())
        }
    }

    /// 基于 rumqttc 的发布器
    ///
    /// `publish` 使用 `try_publish`，客户端队列满时立即返回错误而不阻塞。
    pub struct RumqttcPublisher {
        client: Option<Client>,
        connected: Arc<AtomicBool>,
        is_running: Arc<AtomicBool>,
        event_loop: Option<JoinHandle<()>>,
        done_rx: crossbeam_channel::Receiver<()>,
    }

    impl RumqttcPublisher {
        /// 创建客户端并启动事件循环线程
        ///
        /// 不等待连接建立；连接状态通过 [`MqttPublisher::is_connected`] 查询。
        pub fn connect(config: &RumqttcConfig) -> Result<Self, SinkError> {
            config.validate()?;

            let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
            options.set_keep_alive(config.keep_alive);
            options.set_clean_session(true);

            let (client, mut connection) = Client::new(options, config.request_capacity);
            let connected = Arc::new(AtomicBool::new(false));
            let is_running = Arc::new(AtomicBool::new(true));
            let (done_tx, done_rx) = bounded(1);

            let connected_clone = connected.clone();
            let is_running_clone = is_running.clone();
            let broker = format!("{}:{}", config.host, config.port);

            let event_loop = thread::Builder::new()
                .name("ldm-mqtt".into())
                .spawn(move || {
                    for notification in connection.iter() {
                        if !is_running_clone.load(Ordering::Acquire) {
                            break;
                        }
                        match notification {
                            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                                info!("MQTT connected to {} ({:?})", broker, ack.code);
                                connected_clone.store(true, Ordering::Release);
                            },
                            Ok(Event::Incoming(Packet::Disconnect)) => {
                                warn!("MQTT broker {} closed the connection", broker);
                                connected_clone.store(false, Ordering::Release);
                            },
                            Ok(event) => {
                                debug!("MQTT event: {:?}", event);
                            },
                            Err(e) => {
                                if connected_clone.swap(false, Ordering::AcqRel) {
                                    warn!("MQTT connection to {} lost: {}", broker, e);
                                } else {
                                    warn!("MQTT connect to {} failed: {}", broker, e);
                                }
                                if !is_running_clone.load(Ordering::Acquire) {
                                    break;
                                }
                                thread::sleep(RECONNECT_DELAY);
                            },
                        }
                    }
                    connected_clone.store(false, Ordering::Release);
                    let _ = done_tx.send(());
                })?;

            Ok(Self {
                client: Some(client),
                connected,
                is_running,
                event_loop: Some(event_loop),
                done_rx,
            })
        }

        fn shutdown(&mut self) {
            self.is_running.store(false, Ordering::Release);
            if let Some(client) = self.client.take() {
                if let Err(e) = client.try_disconnect() {
                    debug!("MQTT disconnect request failed: {}", e);
                }
                // 最后一个客户端句柄释放后 connection.iter() 结束
                drop(client);
            }
            if let Some(handle) = self.event_loop.take() {
                if self.done_rx.recv_timeout(SHUTDOWN_GRACE).is_ok() {
                    let _ = handle.join();
                } else {
                    warn!("MQTT event loop did not exit within {:?}, detaching", SHUTDOWN_GRACE);
                }
            }
        }
    }

    impl MqttPublisher for RumqttcPublisher {
        fn publish(&mut self, message: MqttMessage) -> Result<(), SinkError> {
            let Some(client) = self.client.as_ref() else {
                return Err(SinkError::Publish("publisher is shut down".to_string()));
            };
            client.try_publish(message.topic, message.qos.into(), message.retain, message.payload)?;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::Acquire)
        }

        fn disconnect(&mut self) {
            self.shutdown();
        }
    }

    impl Drop for RumqttcPublisher {
        fn drop(&mut self) {
            self.shutdown();
        }
    }

}
