//! 模拟传感器：在 mock 链路对端解析请求并按脚本应答

#![allow(dead_code)]

use crossbeam_channel::{Receiver, Sender, unbounded};
use ldm_driver::LaserDevice;
use ldm_processing::{PipelineInput, pipeline_channel};
use ldm_protocol::{
    DeviceStatus, FrameCodec, MeskernelCodec, Opcode, Register, ResponseFrame, SerialNumber,
};
use ldm_transport::TransportTarget;
use ldm_transport::mock::{MockOpener, MockPeer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const TEST_PORT: &str = "/dev/ttyMOCK0";

pub fn target() -> TransportTarget {
    TransportTarget::serial(TEST_PORT, 115_200)
}

/// 出厂行为的应答
pub fn default_response(opcode: Opcode) -> Vec<ResponseFrame> {
    match opcode {
        Opcode::LaserOn => vec![ResponseFrame::new_ack(Register::Laser, 1)],
        Opcode::LaserOff => vec![ResponseFrame::new_ack(Register::Laser, 0)],
        Opcode::SingleMeasure(_) | Opcode::ReadLastMeasurement => {
            vec![ResponseFrame::new_measurement(1500, 80)]
        },
        Opcode::ContinuousStart(_) => vec![ResponseFrame::new_measurement(1000, 80)],
        Opcode::ContinuousStop => vec![],
        Opcode::ReadStatus => vec![ResponseFrame::new_status(DeviceStatus::Ok)],
        Opcode::ReadVersion(kind) => vec![ResponseFrame::new_version(kind, 0x0102)],
        Opcode::ReadSerial => vec![ResponseFrame::new_serial(SerialNumber(*b"LD01"))],
        Opcode::ReadVoltage => vec![ResponseFrame::new_voltage(3287)],
    }
}

pub fn encode(frame: &ResponseFrame) -> Vec<u8> {
    MeskernelCodec::new().encode_response(frame).to_vec()
}

/// 运行中的模拟传感器
pub struct SimulatedSensor {
    peer: MockPeer,
    requests: Receiver<Opcode>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SimulatedSensor {
    pub fn spawn<F>(peer: MockPeer, mut respond: F) -> Self
    where
        F: FnMut(Opcode) -> Vec<ResponseFrame> + Send + 'static,
    {
        let (log_tx, log_rx): (Sender<Opcode>, Receiver<Opcode>) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let peer = peer.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let codec = MeskernelCodec::new();
                while !stop.load(Ordering::Acquire) {
                    let Some(bytes) = peer.recv_written(Duration::from_millis(5)) else {
                        continue;
                    };
                    let Some(opcode) = codec.parse_request(&bytes) else {
                        continue;
                    };
                    let _ = log_tx.send(opcode);
                    for frame in respond(opcode) {
                        peer.inject(codec.encode_response(&frame).to_vec());
                    }
                }
            })
        };
        Self {
            peer,
            requests: log_rx,
            stop,
            thread: Some(thread),
        }
    }

    pub fn peer(&self) -> &MockPeer {
        &self.peer
    }

    /// 注入一帧（设备主动上报）
    pub fn emit(&self, frame: &ResponseFrame) {
        self.peer.inject(encode(frame));
    }

    /// 已收到的请求（非阻塞收集）
    pub fn received(&self) -> Vec<Opcode> {
        self.requests.try_iter().collect()
    }

    /// 等待下一条请求
    pub fn next_request(&self, timeout: Duration) -> Option<Opcode> {
        self.requests.recv_timeout(timeout).ok()
    }
}

impl Drop for SimulatedSensor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// 已连接的设备 + 模拟传感器 + pipeline 输入端
pub struct Harness {
    pub device: Arc<LaserDevice>,
    pub sensor: SimulatedSensor,
    pub samples: Receiver<PipelineInput>,
    pub opener: Arc<MockOpener>,
}

pub fn connect_with<F>(command_timeout: Duration, retries: u32, respond: F) -> Harness
where
    F: FnMut(Opcode) -> Vec<ResponseFrame> + Send + 'static,
{
    let opener = Arc::new(MockOpener::new());
    let sensor = SimulatedSensor::spawn(opener.push_link(), respond);
    let (tx, samples) = pipeline_channel(64);
    let device = LaserDevice::builder()
        .opener(opener.clone())
        .pipeline(tx)
        .command_timeout(command_timeout)
        .retries(retries)
        .build()
        .unwrap();
    device.connect(target()).unwrap();
    Harness {
        device: Arc::new(device),
        sensor,
        samples,
        opener,
    }
}

pub fn connect_default() -> Harness {
    connect_with(Duration::from_millis(500), 2, default_response)
}

/// 接收下一个样本（跳过会话标记）
pub fn next_sample(samples: &Receiver<PipelineInput>) -> Option<ldm_protocol::MeasurementSample> {
    loop {
        match samples.recv_timeout(Duration::from_secs(1)).ok()? {
            PipelineInput::Sample(sample) => return Some(sample),
            PipelineInput::SessionStart => continue,
        }
    }
}

/// 等待条件成立
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

pub fn samples_channel() -> (Sender<PipelineInput>, Receiver<PipelineInput>) {
    pipeline_channel(64)
}
