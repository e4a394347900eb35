//! 请求/响应会合表
//!
//! 调用方先登记等待条目再写出命令，IO 线程在收到匹配帧时取出条目并通过
//! 一次性通道（容量 1）交付结果。谁从表中移除条目，谁就负责交付结果，
//! 因此每个请求恰好得到一个终态结果。

use crate::error::DriverError;
use crossbeam_channel::{Receiver, Sender, bounded};
use ldm_protocol::{Opcode, Register, ResponseFrame};
use parking_lot::Mutex;
use smallvec::SmallVec;

pub(crate) type Reply = Result<ResponseFrame, DriverError>;

pub(crate) struct PendingRequest {
    pub id: u64,
    pub opcode: Opcode,
    pub expect: Register,
    reply: Sender<Reply>,
}

impl PendingRequest {
    /// 交付结果（接收端总有 1 个空位，不会阻塞）
    pub fn complete(self, result: Reply) {
        let _ = self.reply.try_send(result);
    }

    /// 测量类命令的应答也是一个有效样本
    pub fn carries_sample(&self) -> bool {
        matches!(self.opcode, Opcode::SingleMeasure(_) | Opcode::ContinuousStart(_))
    }
}

#[derive(Default)]
struct Inner {
    entries: SmallVec<[PendingRequest; 4]>,
    closed: bool,
}

/// 单个会话的等待表
#[derive(Default)]
pub(crate) struct PendingTable {
    inner: Mutex<Inner>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记等待条目
    ///
    /// 会话已结束时返回 `ConnectionLost`，不会登记。
    pub fn register(&self, id: u64, opcode: Opcode, expect: Register) -> Result<Receiver<Reply>, DriverError> {
        let (reply, rx) = bounded(1);
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(DriverError::ConnectionLost);
        }
        inner.entries.push(PendingRequest {
            id,
            opcode,
            expect,
            reply,
        });
        Ok(rx)
    }

    /// 按 id 移除（调用方超时或写失败）
    pub fn remove(&self, id: u64) -> Option<PendingRequest> {
        let mut inner = self.inner.lock();
        let index = inner.entries.iter().position(|p| p.id == id)?;
        Some(inner.entries.remove(index))
    }

    /// 取出最早登记且期望该寄存器的条目
    pub fn take_matching(&self, register: Register) -> Option<PendingRequest> {
        let mut inner = self.inner.lock();
        let index = inner.entries.iter().position(|p| p.expect == register)?;
        Some(inner.entries.remove(index))
    }

    /// 取出最早登记的条目（设备拒绝帧不一定带可识别的寄存器）
    pub fn take_oldest(&self) -> Option<PendingRequest> {
        let mut inner = self.inner.lock();
        if inner.entries.is_empty() {
            return None;
        }
        Some(inner.entries.remove(0))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// 结束会话：拒绝后续登记，并以 `error()` 结束所有等待中的条目
    pub fn close_all(&self, error: impl Fn() -> DriverError) -> usize {
        let drained: SmallVec<[PendingRequest; 4]> = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.entries.drain(..).collect()
        };
        let count = drained.len();
        for pending in drained {
            pending.complete(Err(error()));
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldm_protocol::MeasureSpeed;

    #[test]
    fn test_match_completes_once() {
        let table = PendingTable::new();
        let rx = table
            .register(1, Opcode::ReadStatus, Register::Status)
            .unwrap();

        let pending = table.take_matching(Register::Status).unwrap();
        assert!(table.take_matching(Register::Status).is_none());
        assert!(table.remove(1).is_none());

        pending.complete(Ok(ResponseFrame::new_measurement(1, 1)));
        assert!(rx.try_recv().unwrap().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_matching_is_fifo_per_register() {
        let table = PendingTable::new();
        let _a = table.register(1, Opcode::ReadStatus, Register::Status).unwrap();
        let _b = table
            .register(2, Opcode::ReadSerial, Register::SerialNumber)
            .unwrap();
        let _c = table.register(3, Opcode::ReadStatus, Register::Status).unwrap();

        assert_eq!(table.take_matching(Register::Status).unwrap().id, 1);
        assert_eq!(table.take_oldest().unwrap().id, 2);
        assert_eq!(table.take_matching(Register::Status).unwrap().id, 3);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_close_all_fails_pending_and_rejects_new() {
        let table = PendingTable::new();
        let rx = table
            .register(
                1,
                Opcode::SingleMeasure(MeasureSpeed::Auto),
                Register::MeasurementResult,
            )
            .unwrap();

        assert_eq!(table.close_all(|| DriverError::ConnectionLost), 1);
        assert!(matches!(rx.try_recv().unwrap(), Err(DriverError::ConnectionLost)));
        assert!(matches!(
            table.register(2, Opcode::ReadStatus, Register::Status),
            Err(DriverError::ConnectionLost)
        ));
    }

    #[test]
    fn test_carries_sample() {
        let table = PendingTable::new();
        let _a = table
            .register(
                1,
                Opcode::SingleMeasure(MeasureSpeed::Fast),
                Register::MeasurementResult,
            )
            .unwrap();
        let _b = table
            .register(2, Opcode::ReadLastMeasurement, Register::MeasurementResult)
            .unwrap();
        assert!(table.take_oldest().unwrap().carries_sample());
        assert!(!table.take_oldest().unwrap().carries_sample());
    }
}
