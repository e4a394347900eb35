//! IO 线程命令队列条目

use crate::error::DriverError;
use crossbeam_channel::Sender;
use ldm_protocol::Command;

/// 交给 IO 线程写出的请求
///
/// - `pending_id`：对应等待表中的条目；写失败时 IO 线程以错误结束该条目
/// - `written`：不等待响应的命令（退出连续测量）通过它得知写出结果
#[derive(Debug)]
pub(crate) struct TxRequest {
    pub command: Command,
    pub pending_id: Option<u64>,
    pub written: Option<Sender<Result<(), DriverError>>>,
}

impl TxRequest {
    pub(crate) fn awaiting(command: Command, pending_id: u64) -> Self {
        Self {
            command,
            pending_id: Some(pending_id),
            written: None,
        }
    }

    pub(crate) fn fire_and_forget(command: Command, written: Sender<Result<(), DriverError>>) -> Self {
        Self {
            command,
            pending_id: None,
            written: Some(written),
        }
    }
}
