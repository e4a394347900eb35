//! SDK 错误类型

use crate::config::ConfigError;
use ldm_driver::DriverError;
use ldm_sinks::SinkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    /// 连续失败次数达到上限
    #[error("Giving up after {attempts} failed connection cycle(s): {last_error}")]
    ReconnectExhausted { attempts: u32, last_error: String },

    #[error("Logger already initialized: {0}")]
    Logger(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}
