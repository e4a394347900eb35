//! Mock 传输（无硬件依赖）
//!
//! [`MockTransport`] 与 [`MockPeer`] 构成内存中的双工链路：
//! - 设备侧（被测代码）通过 `Transport` trait 读写
//! - 对端（测试代码）注入入站字节、读取出站字节、模拟断线

use crate::{Transport, TransportError, TransportOpener, TransportOptions, TransportTarget};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

enum Inbound {
    Data(Vec<u8>),
    Disconnect,
}

#[derive(Default)]
struct LinkFlags {
    closed: AtomicBool,
    fail_writes: AtomicBool,
    close_count: AtomicUsize,
}

/// Mock 传输（设备侧）
pub struct MockTransport {
    target: TransportTarget,
    inbound: Receiver<Inbound>,
    outbound: Sender<Vec<u8>>,
    pending: VecDeque<u8>,
    poll_interval: Duration,
    flags: Arc<LinkFlags>,
}

/// Mock 对端（测试侧）
#[derive(Clone)]
pub struct MockPeer {
    inbound: Sender<Inbound>,
    outbound: Receiver<Vec<u8>>,
    flags: Arc<LinkFlags>,
}

impl MockTransport {
    /// 创建一对相连的传输与对端
    pub fn pair(target: TransportTarget) -> (MockTransport, MockPeer) {
        let (in_tx, in_rx) = unbounded();
        let (out_tx, out_rx) = unbounded();
        let flags = Arc::new(LinkFlags::default());
        (
            MockTransport {
                target,
                inbound: in_rx,
                outbound: out_tx,
                pending: VecDeque::new(),
                poll_interval: Duration::from_millis(5),
                flags: flags.clone(),
            },
            MockPeer {
                inbound: in_tx,
                outbound: out_rx,
                flags,
            },
        )
    }

    fn drain_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        n
    }
}

impl Transport for MockTransport {
    fn target(&self) -> &TransportTarget {
        &self.target
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.flags.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        if self.flags.fail_writes.load(Ordering::Acquire) {
            return Err(TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        self.outbound
            .send(bytes.to_vec())
            .map_err(|_| TransportError::Disconnected)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.flags.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        if !self.pending.is_empty() {
            return Ok(self.drain_pending(buf));
        }
        match self.inbound.recv_timeout(self.poll_interval) {
            Ok(Inbound::Data(data)) => {
                self.pending.extend(data);
                Ok(self.drain_pending(buf))
            },
            Ok(Inbound::Disconnect) | Err(RecvTimeoutError::Disconnected) => {
                Err(TransportError::Disconnected)
            },
            Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout),
        }
    }

    fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn close(&mut self) {
        if !self.flags.closed.swap(true, Ordering::AcqRel) {
            self.flags.close_count.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn is_open(&self) -> bool {
        !self.flags.closed.load(Ordering::Acquire)
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl MockPeer {
    /// 注入入站字节（设备 → 主机）
    pub fn inject(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self.inbound.send(Inbound::Data(bytes.into()));
    }

    /// 模拟链路中断
    pub fn disconnect(&self) {
        let _ = self.inbound.send(Inbound::Disconnect);
    }

    /// 后续写入返回 BrokenPipe
    pub fn fail_writes(&self, fail: bool) {
        self.flags.fail_writes.store(fail, Ordering::Release);
    }

    /// 等待下一次写入（主机 → 设备）
    pub fn recv_written(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.outbound.recv_timeout(timeout).ok()
    }

    /// 非阻塞读取下一次写入
    pub fn try_recv_written(&self) -> Option<Vec<u8>> {
        match self.outbound.try_recv() {
            Ok(bytes) => Some(bytes),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// 传输是否已关闭
    pub fn is_closed(&self) -> bool {
        self.flags.closed.load(Ordering::Acquire)
    }

    /// `close()` 实际生效的次数（幂等性检查）
    pub fn close_count(&self) -> usize {
        self.flags.close_count.load(Ordering::Acquire)
    }
}

/// Mock 传输工厂：按顺序返回预先放入的传输或错误
#[derive(Default)]
pub struct MockOpener {
    queue: Mutex<VecDeque<Result<MockTransport, TransportError>>>,
    opened: Mutex<Vec<TransportTarget>>,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// 放入一条链路，返回对端
    pub fn push_link(&self) -> MockPeer {
        let (transport, peer) = MockTransport::pair(TransportTarget::default());
        self.queue.lock().push_back(Ok(transport));
        peer
    }

    /// 放入一次打开失败
    pub fn push_error(&self, error: TransportError) {
        self.queue.lock().push_back(Err(error));
    }

    /// 已请求打开的目标
    pub fn opened_targets(&self) -> Vec<TransportTarget> {
        self.opened.lock().clone()
    }
}

impl TransportOpener for MockOpener {
    fn open(
        &self,
        target: &TransportTarget,
        options: &TransportOptions,
    ) -> Result<Box<dyn Transport>, TransportError> {
        target.validate()?;
        self.opened.lock().push(target.clone());
        match self.queue.lock().pop_front() {
            Some(Ok(mut transport)) => {
                transport.target = target.clone();
                transport.set_poll_interval(options.poll_interval);
                Ok(Box::new(transport))
            },
            Some(Err(e)) => Err(e),
            None => Err(TransportError::Connection {
                target: target.to_string(),
                message: "no mock link queued".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_and_read() {
        let (mut transport, peer) = MockTransport::pair(TransportTarget::default());
        peer.inject(vec![1, 2, 3, 4, 5]);
        let mut buf = [0u8; 3];
        assert_eq!(transport.read_available(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(transport.read_available(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert!(matches!(
            transport.read_available(&mut buf),
            Err(TransportError::Timeout)
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut transport, peer) = MockTransport::pair(TransportTarget::default());
        transport.close();
        transport.close();
        drop(transport);
        assert!(peer.is_closed());
        assert_eq!(peer.close_count(), 1);
    }

    #[test]
    fn test_disconnect_is_fatal() {
        let (mut transport, peer) = MockTransport::pair(TransportTarget::default());
        peer.disconnect();
        let err = transport.read_available(&mut [0u8; 8]).unwrap_err();
        assert!(err.is_fatal());
    }
}
