//! 命令定义和实现

pub mod config;
pub mod exec;
pub mod monitor;
pub mod mqtt;

pub use config::ConfigCommand;
pub use exec::ExecCommand;
pub use monitor::MonitorCommand;
pub use mqtt::MqttCommand;
