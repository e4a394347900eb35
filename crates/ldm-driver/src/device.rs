//! 激光测距传感器驱动（对外 API）
//!
//! [`LaserDevice`] 独占一个传输会话：
//! - `connect` 打开传输、启动 IO 线程并完成握手（读取状态）
//! - `send` 写出命令并以会合方式等待关联响应，超时后有限次重试
//! - `start_continuous` / `stop_continuous` 在 ConnectedIdle 与 Measuring 之间切换
//! - `disconnect` 尽力停止测量并关闭传输，总是回到 Disconnected
//!
//! 所有方法只需要 `&self`，可在多个线程间通过 `Arc<LaserDevice>` 共享。

use crate::command::TxRequest;
use crate::error::DriverError;
use crate::events::{DeviceEvent, EventBus};
use crate::heartbeat::{ConnectionMonitor, monotonic_micros};
use crate::hooks::{FrameObserver, HookManager};
use crate::info::DeviceInfo;
use crate::metrics::DeviceMetrics;
use crate::pending::PendingTable;
use crate::pipeline::{IoContext, io_loop};
use crate::state::{AtomicSessionState, SessionState};
use arc_swap::ArcSwapOption;
use crossbeam_channel::{RecvTimeoutError, Receiver, Sender, TrySendError, bounded};
use ldm_processing::PipelineInput;
use ldm_protocol::constants::DEFAULT_COMMAND_TIMEOUT;
use ldm_protocol::{
    Command, DeviceStatus, FrameCodec, MeasureSpeed, Measurement, MeasurementSample,
    MeskernelCodec, Opcode, ProtocolError, ResponseBody, ResponseFrame, SerialNumber, VersionKind,
};
use ldm_transport::{TransportOpener, TransportOptions, TransportTarget};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, trace, warn};

/// 每个会话创建一个新的编解码器
pub type CodecFactory = Arc<dyn Fn() -> Box<dyn FrameCodec> + Send + Sync>;

/// 默认编解码器工厂（Meskernel 协议）
pub fn meskernel_codec() -> CodecFactory {
    Arc::new(|| Box::new(MeskernelCodec::new()) as Box<dyn FrameCodec>)
}

/// 重试次数上限
pub const MAX_RETRIES: u32 = 10;

/// 协议引擎配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// 单次等待响应的时间
    pub command_timeout: Duration,
    /// 超时后的重试次数
    pub retries: u32,
    /// 传输读取的最大阻塞时间（也是 IO 线程检查停止标志的周期）
    pub poll_interval: Duration,
    /// 连接时读取状态作为握手
    pub handshake: bool,
    /// 命令队列容量
    pub command_queue_capacity: usize,
    /// 事件通道容量
    pub event_capacity: usize,
    /// 关闭时等待 IO 线程退出的时间
    pub shutdown_grace: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            retries: 2,
            poll_interval: Duration::from_millis(10),
            handshake: true,
            command_queue_capacity: 32,
            event_capacity: crate::events::DEFAULT_EVENT_CAPACITY,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl DeviceConfig {
    /// # 错误
    /// 参数超出范围时返回 `DriverError::Configuration`
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.command_timeout.is_zero() {
            return Err(DriverError::Configuration(
                "command timeout must be positive".to_string(),
            ));
        }
        if self.retries > MAX_RETRIES {
            return Err(DriverError::Configuration(format!(
                "retries must be at most {MAX_RETRIES}, got {}",
                self.retries
            )));
        }
        if self.poll_interval.is_zero() || self.poll_interval > Duration::from_secs(1) {
            return Err(DriverError::Configuration(format!(
                "poll interval must be in (0, 1s], got {:?}",
                self.poll_interval
            )));
        }
        if self.command_queue_capacity == 0 || self.event_capacity == 0 {
            return Err(DriverError::Configuration(
                "queue capacities must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// 等待线程退出（超时后放弃等待，线程在退出时自行释放资源）
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        let (tx, rx) = bounded(1);

        // watchdog 线程负责 join，当前线程只等待有限时间
        spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 设备级共享状态（API 线程与 IO 线程共用）
pub(crate) struct DeviceShared {
    pub state: AtomicSessionState,
    pub metrics: Arc<DeviceMetrics>,
    pub monitor: ConnectionMonitor,
    pub events: EventBus,
    pub hooks: RwLock<HookManager>,
    pub samples: Option<Sender<PipelineInput>>,
    pub last_status: ArcSwapOption<DeviceStatus>,
    pub target: ArcSwapOption<TransportTarget>,
    /// 最近一个样本的时间戳（µs），保证样本时间戳严格递增
    pub last_sample_us: AtomicU64,
}

impl DeviceShared {
    /// 仅当当前状态为 `from` 时切换（唯一的条件修改入口）
    pub fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SessionState> {
        self.state.transition(from, to)?;
        self.on_state_changed(from, to);
        Ok(())
    }

    /// 无条件切换，返回旧状态
    pub fn set_state(&self, to: SessionState) -> SessionState {
        let from = self.state.swap(to);
        if from != to {
            self.on_state_changed(from, to);
        }
        from
    }

    fn on_state_changed(&self, from: SessionState, to: SessionState) {
        info!("Session state: {} -> {}", from, to);
        self.events.emit(DeviceEvent::StateChanged { from, to });
    }

    /// 把测量帧作为样本送入 pipeline（队列满时丢弃并计数）
    pub fn forward_sample(&self, measurement: &Measurement) {
        let Some(samples) = &self.samples else {
            return;
        };
        let sample = MeasurementSample::from_measurement(
            measurement,
            self.next_sample_timestamp(),
            unix_millis(),
        );
        match samples.try_send(PipelineInput::Sample(sample)) {
            Ok(()) => DeviceMetrics::add(&self.metrics.samples_forwarded, 1),
            Err(TrySendError::Full(_)) => {
                DeviceMetrics::add(&self.metrics.samples_dropped, 1);
                trace!("pipeline queue full, dropping {} mm", measurement.distance_mm);
            },
            Err(TrySendError::Disconnected(_)) => {
                DeviceMetrics::add(&self.metrics.samples_dropped, 1);
            },
        }
    }

    /// 同一次读取解出的多帧可能落在同一微秒内，此时在上一个时间戳上加 1
    fn next_sample_timestamp(&self) -> u64 {
        let now = monotonic_micros();
        let previous = match self.last_sample_us.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |last| Some(now.max(last + 1)),
        ) {
            Ok(previous) | Err(previous) => previous,
        };
        now.max(previous + 1)
    }

    /// 通知 pipeline 新会话开始
    fn start_session(&self) {
        if let Some(samples) = &self.samples
            && samples
                .send_timeout(PipelineInput::SessionStart, Duration::from_millis(100))
                .is_err()
        {
            warn!("Pipeline did not accept session start marker");
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// 会话的等待表与运行标志
///
/// 与 `Session` 分开存放：`disconnect` 不必等待握手中的 `connect` 释放会话锁，
/// 就能结束在途等待并让 IO 线程退出。
#[derive(Clone)]
struct SessionLink {
    pending: Arc<PendingTable>,
    is_running: Arc<AtomicBool>,
}

impl SessionLink {
    fn interrupt(&self) {
        // Release: IO 线程看到 false 时也能看到之前的写入
        self.is_running.store(false, Ordering::Release);
        let cancelled = self.pending.close_all(|| DriverError::ConnectionLost);
        if cancelled > 0 {
            debug!("Cancelled {} in-flight request(s)", cancelled);
        }
    }
}

/// 一个打开的传输会话
struct Session {
    target: TransportTarget,
    cmd_tx: Option<Sender<TxRequest>>,
    link: SessionLink,
    io_thread: Option<JoinHandle<()>>,
    shutdown_grace: Duration,
}

/// 调用方持有的会话句柄（命令发送端 + 等待表）
struct SessionHandle {
    cmd_tx: Sender<TxRequest>,
    pending: Arc<PendingTable>,
}

impl Session {
    fn handle(&self) -> Result<SessionHandle, DriverError> {
        let cmd_tx = self.cmd_tx.clone().ok_or(DriverError::ConnectionLost)?;
        Ok(SessionHandle {
            cmd_tx,
            pending: self.link.pending.clone(),
        })
    }

    fn stop(&mut self) {
        self.link.is_running.store(false, Ordering::Release);
        // drop 发送端，IO 线程在下一次 drain 时看到 Disconnected
        self.cmd_tx.take();

        if let Some(handle) = self.io_thread.take()
            && let Err(_e) = handle.join_timeout(self.shutdown_grace)
        {
            error!(
                "IO thread for {} panicked or failed to shut down within {:?}",
                self.target, self.shutdown_grace
            );
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 激光测距传感器协议引擎
pub struct LaserDevice {
    config: DeviceConfig,
    opener: Arc<dyn TransportOpener>,
    codec: CodecFactory,
    shared: Arc<DeviceShared>,
    session: Mutex<Option<Session>>,
    link: Mutex<Option<SessionLink>>,
    next_request_id: AtomicU64,
}

impl LaserDevice {
    pub(crate) fn new(
        config: DeviceConfig,
        opener: Arc<dyn TransportOpener>,
        codec: CodecFactory,
        samples: Option<Sender<PipelineInput>>,
        hooks: HookManager,
    ) -> Self {
        let metrics = Arc::new(DeviceMetrics::new());
        let shared = Arc::new(DeviceShared {
            state: AtomicSessionState::default(),
            events: EventBus::new(config.event_capacity, metrics.clone()),
            metrics,
            monitor: ConnectionMonitor::new(),
            hooks: RwLock::new(hooks),
            samples,
            last_status: ArcSwapOption::empty(),
            target: ArcSwapOption::empty(),
            last_sample_us: AtomicU64::new(0),
        });
        Self {
            config,
            opener,
            codec,
            shared,
            session: Mutex::new(None),
            link: Mutex::new(None),
            next_request_id: AtomicU64::new(1),
        }
    }

    /// 创建 Builder
    pub fn builder() -> crate::DeviceBuilder {
        crate::DeviceBuilder::new()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// 当前（或最近一次）会话的目标
    pub fn target(&self) -> Option<TransportTarget> {
        self.shared.target.load_full().map(|t| (*t).clone())
    }

    /// 事件接收端（多个接收端竞争同一队列）
    pub fn events(&self) -> Receiver<DeviceEvent> {
        self.shared.events.subscribe()
    }

    pub fn metrics(&self) -> &Arc<DeviceMetrics> {
        &self.shared.metrics
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.shared.monitor
    }

    /// 最近一次读取或上报的设备状态
    pub fn last_status(&self) -> Option<DeviceStatus> {
        self.shared.last_status.load_full().map(|s| *s)
    }

    /// 注册帧观察者（对当前及后续会话生效）
    pub fn add_observer(&self, observer: Arc<dyn FrameObserver>) {
        self.shared.hooks.write().add_observer(observer);
    }

    /// 打开传输并完成握手
    ///
    /// 成功后状态为 ConnectedIdle；失败时关闭传输并回到 Disconnected。
    ///
    /// # 错误
    /// - `DriverError::InvalidState`: 当前不是 Disconnected
    /// - `DriverError::Connection`: 传输无法打开
    /// - `DriverError::Timeout` / `ConnectionLost`: 握手无响应或链路中断
    pub fn connect(&self, target: TransportTarget) -> Result<(), DriverError> {
        let mut slot = self.session.lock();

        self.shared
            .transition(SessionState::Disconnected, SessionState::Connecting)
            .map_err(|state| DriverError::InvalidState {
                operation: "connect",
                state,
            })?;

        // 上一个会话因链路故障结束后遗留的句柄
        if let Some(stale) = slot.take() {
            debug!("Releasing stale session for {}", stale.target);
        }

        match self.open_session(&target) {
            Ok(session) => {
                self.shared.target.store(Some(Arc::new(target.clone())));
                *slot = Some(session);
                info!("Connected to {}", target);
                Ok(())
            },
            Err(e) => {
                warn!("Failed to connect to {}: {}", target, e);
                self.link.lock().take();
                self.shared.set_state(SessionState::Disconnected);
                Err(e)
            },
        }
    }

    fn open_session(&self, target: &TransportTarget) -> Result<Session, DriverError> {
        let options = TransportOptions {
            poll_interval: self.config.poll_interval,
        };
        let transport = self
            .opener
            .open(target, &options)
            .map_err(DriverError::Connection)?;
        debug!("Transport opened: {}", target);

        let (cmd_tx, cmd_rx) = bounded(self.config.command_queue_capacity);
        let pending = Arc::new(PendingTable::new());
        let is_running = Arc::new(AtomicBool::new(true));
        let ctx = IoContext {
            shared: self.shared.clone(),
            pending: pending.clone(),
            is_running: is_running.clone(),
        };
        let codec = (self.codec)();
        self.shared.monitor.reset();

        let io_thread = std::thread::Builder::new()
            .name("ldm-io".into())
            .spawn(move || io_loop(transport, codec, cmd_rx, ctx))
            .map_err(|e| DriverError::IoThread(e.to_string()))?;

        // 之后任何失败都由 Session::drop 停止 IO 线程并关闭传输
        let session = Session {
            target: target.clone(),
            cmd_tx: Some(cmd_tx),
            link: SessionLink {
                pending,
                is_running,
            },
            io_thread: Some(io_thread),
            shutdown_grace: self.config.shutdown_grace,
        };

        *self.link.lock() = Some(session.link.clone());

        if self.config.handshake {
            let handle = session.handle()?;
            let frame = self.execute(&handle, self.command(Command::read_status()))?;
            if let Some(status) = frame.status() {
                if !status.is_ok() {
                    warn!("Device reports {} during handshake", status);
                }
                self.shared.events.emit(DeviceEvent::Status(status));
            }
        }

        self.shared.start_session();
        self.shared
            .transition(SessionState::Connecting, SessionState::ConnectedIdle)
            .map_err(|_| DriverError::ConnectionLost)?;
        Ok(session)
    }

    /// 尽力停止测量、关闭传输，总是回到 Disconnected
    ///
    /// 断开过程中的 IO 错误被吞掉，不会向调用方报告。在途请求（包括
    /// `connect` 的握手）立即以 `ConnectionLost` 结束。
    pub fn disconnect(&self) {
        if self.state().is_measuring()
            && let Ok(handle) = self.session_handle("stop continuous measurement")
            && let Err(e) = self.write_exit(&handle)
        {
            debug!("Ignoring stop failure during disconnect: {}", e);
        }

        // 先于会话锁：握手中的 connect 持有会话锁
        if let Some(link) = self.link.lock().take() {
            link.interrupt();
        }

        let mut slot = self.session.lock();
        if let Some(session) = slot.take() {
            let target = session.target.clone();
            drop(session);
            info!("Disconnected from {}", target);
        }
        self.shared.set_state(SessionState::Disconnected);
    }

    /// 发送命令并等待关联响应
    ///
    /// 每次等待最长 `command.max_wait`，超时后重试，最多 `retries` 次。
    /// `ContinuousStart` 与 [`start_continuous`](Self::start_continuous) 一样切换到
    /// Measuring，已在 Measuring 时返回 `InvalidState`。
    ///
    /// # 错误
    /// - `DriverError::InvalidState`: 未连接
    /// - `DriverError::NoResponseExpected`: 命令没有响应（使用 [`send_no_reply`](Self::send_no_reply)）
    /// - `DriverError::Timeout`: 重试耗尽
    /// - `DriverError::ConnectionLost`: 等待期间链路中断或被断开
    /// - `DriverError::Protocol`: 设备拒绝或响应负载非法
    pub fn send(&self, command: Command) -> Result<ResponseFrame, DriverError> {
        let handle = self.session_handle("send a command")?;
        match command.opcode {
            Opcode::ContinuousStart(_) => self.enter_continuous(&handle, command),
            _ => self.execute(&handle, command),
        }
    }

    /// 写出不产生响应的命令，等待写出完成
    ///
    /// 连续测量的启停命令同样经过会话状态机：`ContinuousStop` 写出后回到
    /// ConnectedIdle，`ContinuousStart` 等待启动应答后进入 Measuring。
    pub fn send_no_reply(&self, command: Command) -> Result<(), DriverError> {
        let handle = self.session_handle("send a command")?;
        match command.opcode {
            Opcode::ContinuousStart(_) => self.enter_continuous(&handle, command).map(|_| ()),
            Opcode::ContinuousStop => self.leave_continuous(&handle, command),
            _ => self.write_no_reply(&handle, command),
        }
    }

    /// 进入连续测量
    ///
    /// 状态先切换到 Measuring，使随后的测量流可以直接进入 pipeline；
    /// 第一帧测量数据即视为启动应答。已在 Measuring 时直接返回。
    pub fn start_continuous(&self, speed: MeasureSpeed) -> Result<(), DriverError> {
        let handle = self.session_handle("start continuous measurement")?;
        match self.enter_continuous(&handle, self.command(Command::continuous_start(speed))) {
            Ok(_)
            | Err(DriverError::InvalidState {
                state: SessionState::Measuring,
                ..
            }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// 退出连续测量（已空闲时直接返回）
    pub fn stop_continuous(&self) -> Result<(), DriverError> {
        let handle = self.session_handle("stop continuous measurement")?;
        if !self.state().is_measuring() {
            return Ok(());
        }
        self.leave_continuous(&handle, self.command(Command::continuous_stop()))
    }

    fn enter_continuous(
        &self,
        handle: &SessionHandle,
        command: Command,
    ) -> Result<ResponseFrame, DriverError> {
        self.shared
            .transition(SessionState::ConnectedIdle, SessionState::Measuring)
            .map_err(|state| DriverError::InvalidState {
                operation: "start continuous measurement",
                state,
            })?;

        self.execute(handle, command).inspect_err(|e| {
            // 设备可能已进入连续模式，补发退出
            if !e.is_connection_lost() {
                let _ = self.write_exit(handle);
            }
            let _ = self
                .shared
                .transition(SessionState::Measuring, SessionState::ConnectedIdle);
        })
    }

    fn leave_continuous(&self, handle: &SessionHandle, command: Command) -> Result<(), DriverError> {
        self.write_no_reply(handle, command)?;
        let _ = self
            .shared
            .transition(SessionState::Measuring, SessionState::ConnectedIdle);
        Ok(())
    }

    pub fn laser_on(&self) -> Result<(), DriverError> {
        self.expect_ack(Command::laser_on())
    }

    pub fn laser_off(&self) -> Result<(), DriverError> {
        self.expect_ack(Command::laser_off())
    }

    /// 单次测量
    pub fn measure_once(&self, speed: MeasureSpeed) -> Result<Measurement, DriverError> {
        let frame = self.send(self.command(Command::single_measure(speed)))?;
        frame.measurement().ok_or_else(|| unexpected(&frame))
    }

    pub fn read_status(&self) -> Result<DeviceStatus, DriverError> {
        let frame = self.send(self.command(Command::read_status()))?;
        frame.status().ok_or_else(|| unexpected(&frame))
    }

    pub fn read_version(&self, kind: VersionKind) -> Result<u16, DriverError> {
        let frame = self.send(self.command(Command::read_version(kind)))?;
        match frame.body {
            ResponseBody::Version { value, .. } => Ok(value),
            _ => Err(unexpected(&frame)),
        }
    }

    pub fn read_serial(&self) -> Result<SerialNumber, DriverError> {
        let frame = self.send(self.command(Command::read_serial()))?;
        match frame.body {
            ResponseBody::Serial(serial) => Ok(serial),
            _ => Err(unexpected(&frame)),
        }
    }

    /// 输入电压（毫伏）
    pub fn read_voltage(&self) -> Result<u32, DriverError> {
        let frame = self.send(self.command(Command::read_voltage()))?;
        match frame.body {
            ResponseBody::Voltage { millivolts } => Ok(millivolts),
            _ => Err(unexpected(&frame)),
        }
    }

    /// 读取设备保存的最近一次测量结果（不进入 pipeline）
    pub fn read_last_measurement(&self) -> Result<Measurement, DriverError> {
        let frame = self.send(self.command(Command::read_last_measurement()))?;
        frame.measurement().ok_or_else(|| unexpected(&frame))
    }

    /// 依次读取状态、版本、序列号和电压
    pub fn device_info(&self) -> Result<DeviceInfo, DriverError> {
        Ok(DeviceInfo {
            status: self.read_status()?,
            hardware_version: self.read_version(VersionKind::Hardware)?,
            software_version: self.read_version(VersionKind::Software)?,
            serial: self.read_serial()?,
            voltage_mv: self.read_voltage()?,
        })
    }

    fn command(&self, command: Command) -> Command {
        command.with_max_wait(self.config.command_timeout)
    }

    fn expect_ack(&self, command: Command) -> Result<(), DriverError> {
        let frame = self.send(self.command(command))?;
        match frame.body {
            ResponseBody::Ack { .. } => Ok(()),
            _ => Err(unexpected(&frame)),
        }
    }

    fn session_handle(&self, operation: &'static str) -> Result<SessionHandle, DriverError> {
        let state = self.state();
        if !state.is_connected() {
            return Err(DriverError::InvalidState { operation, state });
        }
        match self.session.lock().as_ref() {
            Some(session) => session.handle(),
            None => Err(DriverError::InvalidState {
                operation,
                state: self.state(),
            }),
        }
    }

    fn submit(&self, handle: &SessionHandle, request: TxRequest) -> Result<(), DriverError> {
        handle.cmd_tx.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => DriverError::ChannelFull,
            TrySendError::Disconnected(_) => DriverError::ConnectionLost,
        })
    }

    /// 会合等待：先登记再写出，谁从等待表移除条目谁负责交付结果
    fn execute(&self, handle: &SessionHandle, command: Command) -> Result<ResponseFrame, DriverError> {
        let Some(expect) = command.correlation() else {
            return Err(DriverError::NoResponseExpected(command.opcode));
        };
        let attempts = self.config.retries + 1;
        let metrics = &self.shared.metrics;

        for attempt in 1..=attempts {
            if attempt > 1 {
                DeviceMetrics::add(&metrics.retries, 1);
                debug!("Retrying {} ({}/{})", command.opcode, attempt, attempts);
            }

            let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            let reply = handle.pending.register(id, command.opcode, expect)?;
            if let Err(e) = self.submit(handle, TxRequest::awaiting(command, id)) {
                handle.pending.remove(id);
                return Err(e);
            }

            match reply.recv_timeout(command.max_wait) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => {
                    if handle.pending.remove(id).is_none() {
                        // IO 线程已取出条目，结果马上到达
                        return reply.recv().unwrap_or(Err(DriverError::ConnectionLost));
                    }
                    DeviceMetrics::add(&metrics.timeouts, 1);
                    debug!(
                        "{} timed out after {:?} (attempt {}/{})",
                        command.opcode, command.max_wait, attempt, attempts
                    );
                },
                Err(RecvTimeoutError::Disconnected) => return Err(DriverError::ConnectionLost),
            }
        }

        warn!("{} got no response after {} attempt(s)", command.opcode, attempts);
        Err(DriverError::Timeout {
            opcode: command.opcode,
            attempts,
        })
    }

    fn write_no_reply(&self, handle: &SessionHandle, command: Command) -> Result<(), DriverError> {
        let (written_tx, written_rx) = bounded(1);
        self.submit(handle, TxRequest::fire_and_forget(command, written_tx))?;
        match written_rx.recv_timeout(command.max_wait) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(DriverError::Timeout {
                opcode: command.opcode,
                attempts: 1,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(DriverError::ConnectionLost),
        }
    }

    fn write_exit(&self, handle: &SessionHandle) -> Result<(), DriverError> {
        self.write_no_reply(handle, self.command(Command::continuous_stop()))
    }
}

impl Drop for LaserDevice {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn unexpected(frame: &ResponseFrame) -> DriverError {
    ProtocolError::UnexpectedResponse {
        kind: format!("{:?}", frame.kind()),
        register: frame.register,
    }
    .into()
}
