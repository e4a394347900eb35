//! 单条设备命令
//!
//! 连接 -> 执行 -> 断开。

use crate::args::{SpeedArg, TransportArgs};
use crate::commands::config::load_config;
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use ldm_sdk::LaserDevice;
use ldm_sdk::driver::format_version;
use ldm_sdk::protocol::{MeasureSpeed, VersionKind};
use std::path::Path;

/// 设备命令
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// 打开激光
    LaserOn,
    /// 关闭激光
    LaserOff,
    /// 单次测量
    Measure,
    /// 读取最近一次测量结果
    Last,
    /// 读取设备状态
    Status,
    /// 读取硬件与软件版本
    Version,
    /// 读取序列号
    Serial,
    /// 读取输入电压
    Voltage,
    /// 读取全部设备信息
    Info,
}

/// 单条命令参数
#[derive(Args, Debug)]
pub struct ExecCommand {
    /// 要执行的命令
    #[arg(value_enum)]
    pub action: Action,

    #[command(flatten)]
    pub transport: TransportArgs,

    /// 测量速度（measure）
    #[arg(short, long, value_enum, default_value_t = SpeedArg::Auto)]
    pub speed: SpeedArg,

    /// 连续执行次数（measure）
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u32,
}

impl ExecCommand {
    pub fn execute(&self, config_path: &Path) -> Result<()> {
        let mut config = load_config(config_path)?;
        self.transport.apply(&mut config);
        config.validate()?;

        let target = config.transport_target()?;
        let device = LaserDevice::builder().config(config.device_config()).build()?;
        device
            .connect(target.clone())
            .with_context(|| format!("连接 {} 失败", target))?;

        let result = self.run(&device);
        device.disconnect();
        result
    }

    fn run(&self, device: &LaserDevice) -> Result<()> {
        match self.action {
            Action::LaserOn => {
                device.laser_on()?;
                println!("✅ 激光已打开");
            },
            Action::LaserOff => {
                device.laser_off()?;
                println!("✅ 激光已关闭");
            },
            Action::Measure => {
                let speed = MeasureSpeed::from(self.speed);
                for _ in 0..self.count.max(1) {
                    let m = device.measure_once(speed)?;
                    println!("{} mm  (quality {}, raw {})", m.distance_mm, m.quality, m.raw_quality);
                }
            },
            Action::Last => {
                let m = device.read_last_measurement()?;
                println!("{} mm  (quality {}, raw {})", m.distance_mm, m.quality, m.raw_quality);
            },
            Action::Status => println!("{}", device.read_status()?),
            Action::Version => {
                let hardware = device.read_version(VersionKind::Hardware)?;
                let software = device.read_version(VersionKind::Software)?;
                println!("Hardware version: {}", format_version(hardware));
                println!("Software version: {}", format_version(software));
            },
            Action::Serial => println!("{}", device.read_serial()?),
            Action::Voltage => {
                let millivolts = device.read_voltage()?;
                println!("{:.3} V", f64::from(millivolts) / 1000.0);
            },
            Action::Info => println!("{}", device.device_info()?),
        }
        Ok(())
    }
}
