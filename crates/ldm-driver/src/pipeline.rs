//! Pipeline IO 循环模块
//!
//! 每个打开的传输对应一个 IO 线程，负责：
//! - 写出命令队列中的请求（有界批量 + 时间预算）
//! - 有界阻塞读取、解码、按关联标签把响应交给等待中的调用方
//! - 连续测量期间把未关联的测量帧直接转发给 Processing Pipeline
//! - 传输致命错误时强制会话进入 Disconnected，并立即唤醒所有等待者

use crate::command::TxRequest;
use crate::device::DeviceShared;
use crate::error::DriverError;
use crate::events::DeviceEvent;
use crate::metrics::DeviceMetrics;
use crate::pending::PendingTable;
use crate::state::SessionState;
use crossbeam_channel::{Receiver, TryRecvError};
use ldm_protocol::{FrameCodec, FrameKind, ProtocolError, Register, ResponseBody, ResponseFrame};
use ldm_transport::{Transport, TransportError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// 单次读取缓冲区大小
const READ_BUFFER_SIZE: usize = 256;

/// IO 线程共享上下文
pub(crate) struct IoContext {
    pub shared: Arc<DeviceShared>,
    pub pending: Arc<PendingTable>,
    pub is_running: Arc<AtomicBool>,
}

enum DrainOutcome {
    Idle,
    ChannelClosed,
    Fatal(TransportError),
}

enum IoExit {
    /// 正常停止（disconnect 或句柄 drop）
    Stopped,
    /// 传输失效
    Lost(String),
}

/// IO 线程主循环
///
/// # 参数
/// - `transport`: 会话独占的传输
/// - `codec`: 帧编解码器（跨读取缓存半帧）
/// - `cmd_rx`: 命令队列接收端（所有发送端 drop 后线程退出）
/// - `ctx`: 共享状态
pub(crate) fn io_loop(
    mut transport: Box<dyn Transport>,
    mut codec: Box<dyn FrameCodec>,
    cmd_rx: Receiver<TxRequest>,
    ctx: IoContext,
) {
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::info;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("IO thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set IO thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    let mut buf = [0u8; READ_BUFFER_SIZE];
    let exit = loop {
        // Acquire: 看到 false 时，disconnect 之前的写入都已可见
        if !ctx.is_running.load(Ordering::Acquire) {
            trace!("IO thread: is_running flag is false, exiting");
            break IoExit::Stopped;
        }

        match drain_tx_queue(transport.as_mut(), codec.as_ref(), &cmd_rx, &ctx) {
            DrainOutcome::Idle => {},
            DrainOutcome::ChannelClosed => {
                trace!("IO thread: command channel closed, exiting");
                break IoExit::Stopped;
            },
            DrainOutcome::Fatal(e) => break IoExit::Lost(e.to_string()),
        }

        match transport.read_available(&mut buf) {
            Ok(n) => {
                DeviceMetrics::add(&ctx.shared.metrics.bytes_rx, n as u64);
                ctx.shared.monitor.register_activity();
                trace!("RX {} bytes: {}", n, hex::encode_upper(&buf[..n]));
                codec.push_bytes(&buf[..n]);
                while let Some(result) = codec.next_frame() {
                    match result {
                        Ok(frame) => handle_frame(&ctx, frame),
                        Err(e) => handle_decode_error(&ctx, e),
                    }
                }
            },
            Err(TransportError::Timeout) => {},
            Err(e) if e.is_fatal() => break IoExit::Lost(e.to_string()),
            Err(e) => warn!("Transport read error: {}", e),
        }
    };

    transport.close();
    match exit {
        IoExit::Stopped => {
            let failed = ctx.pending.close_all(|| DriverError::ConnectionLost);
            debug!("IO thread stopped ({} pending request(s) cancelled)", failed);
        },
        IoExit::Lost(reason) => {
            error!("Connection to {} lost: {}", transport.target(), reason);
            // 先切换状态，被唤醒的调用方看到的已是 Disconnected
            ctx.shared.set_state(SessionState::Disconnected);
            ctx.shared.events.emit(DeviceEvent::ConnectionLost { reason });
            ctx.pending.close_all(|| DriverError::ConnectionLost);
        },
    }
}

/// 写出命令队列中的请求
///
/// 限制单次 drain 的条数和时间预算，避免积压命令推迟读取。
fn drain_tx_queue(
    transport: &mut dyn Transport,
    codec: &dyn FrameCodec,
    cmd_rx: &Receiver<TxRequest>,
    ctx: &IoContext,
) -> DrainOutcome {
    const MAX_DRAIN_PER_CYCLE: usize = 32;
    const TIME_BUDGET: Duration = Duration::from_millis(5);

    let start = Instant::now();
    for _ in 0..MAX_DRAIN_PER_CYCLE {
        if start.elapsed() > TIME_BUDGET {
            trace!("Drain time budget exhausted, deferred {} requests", cmd_rx.len());
            break;
        }

        match cmd_rx.try_recv() {
            Ok(request) => {
                if let Err(e) = write_request(transport, codec, request, ctx) {
                    return DrainOutcome::Fatal(e);
                }
            },
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => return DrainOutcome::ChannelClosed,
        }
    }
    DrainOutcome::Idle
}

/// 写出一条请求；只有致命错误才返回 `Err`
fn write_request(
    transport: &mut dyn Transport,
    codec: &dyn FrameCodec,
    request: TxRequest,
    ctx: &IoContext,
) -> Result<(), TransportError> {
    let bytes = codec.encode(&request.command);
    trace!("TX {}: {}", request.command.opcode, hex::encode_upper(&bytes));

    match transport.write(&bytes) {
        Ok(()) => {
            let metrics = &ctx.shared.metrics;
            DeviceMetrics::add(&metrics.bytes_tx, bytes.len() as u64);
            DeviceMetrics::add(&metrics.commands_sent, 1);
            ctx.shared.hooks.read().trigger_tx(&bytes);
            if let Some(written) = request.written {
                let _ = written.try_send(Ok(()));
            }
            Ok(())
        },
        Err(e) if e.is_fatal() => {
            // 等待中的条目由退出路径统一以 ConnectionLost 结束
            if let Some(written) = request.written {
                let _ = written.try_send(Err(DriverError::ConnectionLost));
            }
            Err(e)
        },
        Err(e) => {
            warn!("Failed to send {}: {}", request.command.opcode, e);
            if let Some(id) = request.pending_id {
                if let Some(pending) = ctx.pending.remove(id) {
                    pending.complete(Err(DriverError::Transport(e)));
                }
            } else if let Some(written) = request.written {
                let _ = written.try_send(Err(DriverError::Transport(e)));
            }
            Ok(())
        },
    }
}

/// 路由一帧
///
/// - 设备拒绝：结束最早的等待请求
/// - 匹配等待请求：交付结果；测量类命令的应答同时转发给 pipeline
/// - 连续测量中的未关联测量帧：转发给 pipeline
/// - 其他未匹配帧：记录、计数、发出 `Unsolicited` 事件后丢弃
fn handle_frame(ctx: &IoContext, frame: ResponseFrame) {
    let shared = &ctx.shared;
    DeviceMetrics::add(&shared.metrics.frames_decoded, 1);
    trace!("RX frame {}", frame);
    shared.hooks.read().trigger_rx(&frame);

    if let ResponseBody::Nack { code } = frame.body {
        let rejection = ProtocolError::Rejected {
            register: frame.register,
            code,
        };
        match ctx.pending.take_oldest() {
            Some(pending) => {
                debug!("{} rejected: {}", pending.opcode, rejection);
                pending.complete(Err(rejection.into()));
            },
            None => discard(ctx, &frame),
        }
        return;
    }

    let matched = frame
        .known_register()
        .and_then(|register| ctx.pending.take_matching(register));
    let measuring = shared.state.get().is_measuring();

    if let Some(measurement) = frame.measurement() {
        let forward = match &matched {
            Some(pending) => pending.carries_sample(),
            None => measuring,
        };
        if forward {
            shared.forward_sample(&measurement);
        }
    }
    if let Some(status) = frame.status() {
        shared.last_status.store(Some(Arc::new(status)));
    }

    match matched {
        Some(pending) => pending.complete(Ok(frame)),
        None if measuring && frame.kind() == FrameKind::Measurement => {},
        None => {
            if let Some(status) = frame.status() {
                shared.events.emit(DeviceEvent::Status(status));
            }
            discard(ctx, &frame);
        },
    }
}

fn discard(ctx: &IoContext, frame: &ResponseFrame) {
    debug!("Discarding unsolicited frame {}", frame);
    DeviceMetrics::add(&ctx.shared.metrics.unsolicited_frames, 1);
    ctx.shared.events.emit(DeviceEvent::Unsolicited {
        kind: frame.kind(),
        register: frame.register,
    });
}

/// 解码失败：损坏帧只计数；负载与寄存器不符时结束对应的等待请求
fn handle_decode_error(ctx: &IoContext, error: ProtocolError) {
    ctx.shared.hooks.read().trigger_error(&error);
    if error.is_corruption() {
        DeviceMetrics::add(&ctx.shared.metrics.corrupt_frames, 1);
        debug!("Discarding corrupt frame: {}", error);
    } else {
        debug!("Undecodable frame: {}", error);
    }

    if let Some(register) = error.register().and_then(|r| Register::try_from(r).ok())
        && let Some(pending) = ctx.pending.take_matching(register)
    {
        pending.complete(Err(error.clone().into()));
    }
    ctx.shared.events.emit(DeviceEvent::FrameError(error.to_string()));
}
