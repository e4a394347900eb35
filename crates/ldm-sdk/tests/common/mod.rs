//! 桥接测试工具：连续测量模拟传感器与内存 MQTT 发布器

#![allow(dead_code)]

use crossbeam_channel::{Receiver, unbounded};
use ldm_protocol::{DeviceStatus, FrameCodec, MeskernelCodec, Opcode, ResponseFrame};
use ldm_sdk::AppConfig;
use ldm_sinks::{MqttMessage, MqttPublisher, PublishPolicy, SinkError};
use ldm_transport::mock::MockPeer;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// 连续测量时的上报周期
const STREAM_PERIOD: Duration = Duration::from_millis(20);

pub fn test_config(max_attempts: u32, backoff_ms: u64) -> AppConfig {
    let mut config = AppConfig::default();
    config.transport.serial.port = "/dev/ttyMOCK0".to_string();
    config.driver.command_timeout_ms = 200;
    config.driver.retries = 1;
    config.mqtt.publish = PublishPolicy::EveryNth(1);
    config.reconnect.max_attempts = max_attempts;
    config.reconnect.backoff_ms = backoff_ms;
    config
}

/// 进入连续测量后按固定周期上报递增距离的传感器
pub struct StreamingSensor {
    peer: MockPeer,
    requests: Receiver<Opcode>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl StreamingSensor {
    pub fn spawn(peer: MockPeer, start_distance_mm: u32) -> Self {
        let (log_tx, requests) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let peer = peer.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let codec = MeskernelCodec::new();
                let mut streaming = false;
                let mut distance = start_distance_mm;
                let mut last_emit = Instant::now();
                while !stop.load(Ordering::Acquire) {
                    if let Some(bytes) = peer.recv_written(Duration::from_millis(5))
                        && let Some(opcode) = codec.parse_request(&bytes)
                    {
                        let _ = log_tx.send(opcode);
                        let reply = match opcode {
                            Opcode::ReadStatus => Some(ResponseFrame::new_status(DeviceStatus::Ok)),
                            Opcode::ContinuousStart(_) => {
                                streaming = true;
                                last_emit = Instant::now();
                                Some(ResponseFrame::new_measurement(distance, 80))
                            },
                            Opcode::ContinuousStop => {
                                streaming = false;
                                None
                            },
                            _ => None,
                        };
                        if let Some(frame) = reply {
                            peer.inject(codec.encode_response(&frame).to_vec());
                        }
                    }
                    if streaming && last_emit.elapsed() >= STREAM_PERIOD {
                        distance += 5;
                        last_emit = Instant::now();
                        let frame = ResponseFrame::new_measurement(distance, 80);
                        peer.inject(codec.encode_response(&frame).to_vec());
                    }
                }
            })
        };
        Self {
            peer,
            requests,
            stop,
            thread: Some(thread),
        }
    }

    pub fn peer(&self) -> &MockPeer {
        &self.peer
    }

    /// 等待指定请求出现
    pub fn wait_for(&self, wanted: impl Fn(Opcode) -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match self.requests.recv_timeout(remaining) {
                Ok(opcode) if wanted(opcode) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
        false
    }
}

impl Drop for StreamingSensor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// 记录所有消息的发布器
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    pub messages: Arc<Mutex<Vec<MqttMessage>>>,
}

impl MqttPublisher for RecordingPublisher {
    fn publish(&mut self, message: MqttMessage) -> Result<(), SinkError> {
        self.messages.lock().push(message);
        Ok(())
    }
}

impl RecordingPublisher {
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn distances(&self) -> Vec<u64> {
        self.messages
            .lock()
            .iter()
            .map(|m| {
                let json: serde_json::Value = serde_json::from_slice(&m.payload).unwrap();
                json["distance_mm"].as_u64().unwrap()
            })
            .collect()
    }
}

/// 等待条件成立（最长 2 秒）
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}
