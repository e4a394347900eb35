//! 日志初始化
//!
//! 库代码只通过 `tracing` 宏输出日志；嵌入应用调用 [`init_logger`] 安装订阅器。
//! 依赖中使用 `log` 的记录经 `tracing-log` 转发。

use crate::SdkError;
use tracing_subscriber::EnvFilter;

/// 默认过滤指令（`RUST_LOG` 未设置时使用）
pub const DEFAULT_LOG_DIRECTIVE: &str = "info";

/// 安装全局订阅器（已安装时静默忽略）
pub fn init_logger() {
    let _ = try_init_logger(DEFAULT_LOG_DIRECTIVE);
}

/// 安装全局订阅器
///
/// `RUST_LOG` 优先；未设置或无法解析时使用 `default_directive`。
///
/// # 错误
/// 进程内已安装过订阅器或 `log` 转发器时返回 `SdkError::Logger`
pub fn try_init_logger(default_directive: &str) -> Result<(), SdkError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| SdkError::Logger(e.to_string()))?;
    tracing_log::LogTracer::init().map_err(|e| SdkError::Logger(e.to_string()))?;
    Ok(())
}
