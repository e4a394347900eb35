//! 各命令共用的参数

use clap::{Args, ValueEnum};
use ldm_sdk::protocol::MeasureSpeed;
use ldm_sdk::{AppConfig, TransportKind};

/// 传输参数（覆盖配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct TransportArgs {
    /// 串口路径（如 /dev/ttyUSB0、COM3）
    #[arg(short, long, conflicts_with = "bluetooth")]
    pub port: Option<String>,

    /// 串口波特率
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// 蓝牙地址（AA:BB:CC:DD:EE:FF），使用 RFCOMM 连接
    #[arg(long)]
    pub bluetooth: Option<String>,

    /// RFCOMM 通道
    #[arg(long, requires = "bluetooth")]
    pub channel: Option<u8>,
}

impl TransportArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        let transport = &mut config.transport;
        if let Some(port) = &self.port {
            transport.kind = TransportKind::Serial;
            transport.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            transport.serial.baud_rate = baud;
        }
        if let Some(address) = &self.bluetooth {
            transport.kind = TransportKind::Bluetooth;
            transport.bluetooth.address = address.clone();
        }
        if let Some(channel) = self.channel {
            transport.bluetooth.channel = channel;
        }
    }
}

/// 测量速度
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedArg {
    Auto,
    Slow,
    Fast,
}

impl From<SpeedArg> for MeasureSpeed {
    fn from(speed: SpeedArg) -> Self {
        match speed {
            SpeedArg::Auto => MeasureSpeed::Auto,
            SpeedArg::Slow => MeasureSpeed::Slow,
            SpeedArg::Fast => MeasureSpeed::Fast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_override() {
        let mut config = AppConfig::default();
        let args = TransportArgs {
            port: Some("/dev/ttyACM0".to_string()),
            baud: Some(9600),
            ..Default::default()
        };
        args.apply(&mut config);

        assert_eq!(config.transport.kind, TransportKind::Serial);
        assert_eq!(config.transport.serial.port, "/dev/ttyACM0");
        assert_eq!(config.transport.serial.baud_rate, 9600);
    }

    #[test]
    fn test_bluetooth_override() {
        let mut config = AppConfig::default();
        let args = TransportArgs {
            bluetooth: Some("00:21:13:0A:BC:DE".to_string()),
            channel: Some(3),
            ..Default::default()
        };
        args.apply(&mut config);

        assert_eq!(config.transport.kind, TransportKind::Bluetooth);
        assert_eq!(config.transport.bluetooth.channel, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_override_keeps_config() {
        let mut config = AppConfig::default();
        TransportArgs::default().apply(&mut config);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_speed_mapping() {
        assert_eq!(MeasureSpeed::from(SpeedArg::Fast), MeasureSpeed::Fast);
        assert_eq!(MeasureSpeed::from(SpeedArg::Auto), MeasureSpeed::Auto);
    }
}
