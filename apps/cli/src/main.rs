//! # LDM CLI
//!
//! Meskernel 激光测距传感器命令行工具。
//!
//! ```bash
//! # 生成默认配置（~/.config/ldm/config.toml）
//! ldm-cli config init
//!
//! # 单条命令（内部：连接 -> 执行 -> 断开）
//! ldm-cli exec measure --port /dev/ttyUSB0
//! ldm-cli exec info --bluetooth 00:21:13:0A:BC:DE
//!
//! # 连续测量并在控制台显示速度与统计
//! ldm-cli monitor --csv run.csv
//!
//! # 无人值守：连续测量并发布到 MQTT，断线自动重连
//! ldm-cli mqtt --host 192.168.102.50 --interval-ms 500
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod args;
mod commands;
mod display;

use commands::{ConfigCommand, ExecCommand, MonitorCommand, MqttCommand};

/// LDM CLI - 激光测距传感器命令行工具
#[derive(Parser, Debug)]
#[command(name = "ldm-cli")]
#[command(about = "Command-line tool for Meskernel laser distance sensors", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 <config_dir>/ldm/config.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 输出调试日志（RUST_LOG 优先）
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 执行单条设备命令
    Exec {
        #[command(flatten)]
        args: ExecCommand,
    },

    /// 连续测量并在控制台显示
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },

    /// 连续测量并发布到 MQTT（断线自动重连）
    Mqtt {
        #[command(flatten)]
        args: MqttCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "debug"
    } else {
        ldm_sdk::DEFAULT_LOG_DIRECTIVE
    };
    ldm_sdk::try_init_logger(directive).context("初始化日志失败")?;

    let config_path = match cli.config {
        Some(path) => path,
        None => commands::config::default_config_path()?,
    };

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&config_path),
        Commands::Exec { args } => args.execute(&config_path),
        Commands::Monitor { args } => args.execute(&config_path),
        Commands::Mqtt { args } => args.execute(&config_path),
    }
}
