//! 配置管理命令
//!
//! 配置文件默认位于 `<config_dir>/ldm/config.toml`，格式见 [`AppConfig`]。

use anyhow::{Context, Result, anyhow, bail};
use clap::Subcommand;
use ldm_sdk::AppConfig;
use std::path::{Path, PathBuf};

/// 默认配置文件路径
pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow!("无法确定配置目录"))?;
    path.push("ldm");
    path.push("config.toml");
    Ok(path)
}

/// 加载配置（文件不存在时使用默认值）
pub fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_or_default(path)
        .with_context(|| format!("加载配置失败: {}", path.display()))
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示生效的配置（TOML）
    Show,

    /// 写入默认配置文件
    Init {
        /// 覆盖已有文件
        #[arg(short, long)]
        force: bool,
    },

    /// 检查配置文件
    Check,

    /// 显示配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self, path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Show => Self::show_(path),
            ConfigCommand::Init { force } => Self::init_(path, force),
            ConfigCommand::Check => Self::check_(path),
            ConfigCommand::Path => {
                println!("{}", path.display());
                Ok(())
            },
        }
    }

    fn show_(path: &Path) -> Result<()> {
        let config = load_config(path)?;
        print!("{}", config.to_toml()?);
        Ok(())
    }

    fn init_(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
        }
        AppConfig::default()
            .save(path)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
        println!("✅ 已写入默认配置: {}", path.display());
        Ok(())
    }

    fn check_(path: &Path) -> Result<()> {
        println!("配置文件: {}", path.display());
        if !path.exists() {
            println!("  (不存在，使用默认配置)");
        }
        let config = load_config(path)?;

        println!("  传输:     {}", config.transport_target()?);
        println!(
            "  命令超时: {} ms（重试 {} 次）",
            config.driver.command_timeout_ms, config.driver.retries
        );
        println!("  MQTT:     {}:{}", config.mqtt.host, config.mqtt.port);
        println!("  主题:     {}", config.mqtt.topic);
        println!("  发布策略: {}", config.mqtt.publish);
        println!(
            "  重连:     最多 {} 次，间隔 {} ms",
            config.reconnect.max_attempts, config.reconnect.backoff_ms
        );
        println!("✅ 配置有效");
        Ok(())
    }
}
