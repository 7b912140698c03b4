//! 配置管理命令
//!
//! 会话配置为 TOML 文件，缺省位于 `<config_dir>/scanrig/config.toml`。

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use scanrig_sdk::SessionConfig;

use crate::connection::ConnectArgs;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示生效的配置（含命令行覆盖）
    Show,

    /// 写入默认配置文件
    Init {
        /// 覆盖已有文件
        #[arg(long)]
        force: bool,
    },

    /// 打印配置文件路径
    Path,
}

impl ConfigCommand {
    pub async fn execute(self, connect: &ConnectArgs) -> Result<()> {
        match self {
            ConfigCommand::Show => Self::show_(connect),
            ConfigCommand::Init { force } => Self::init_(connect, force),
            ConfigCommand::Path => {
                println!("{}", connect.config_file()?.display());
                Ok(())
            },
        }
    }

    fn show_(connect: &ConnectArgs) -> Result<()> {
        let file = connect.config_file()?;
        let config = connect.load_config()?;
        let exists = if file.exists() { "" } else { "（不存在，使用默认值）" };
        println!("# 配置文件: {}{}", file.display(), exists);
        print!("{}", toml::to_string_pretty(&config).context("序列化配置失败")?);
        Ok(())
    }

    fn init_(connect: &ConnectArgs, force: bool) -> Result<()> {
        let file = connect.config_file()?;
        if file.exists() && !force {
            bail!("配置文件已存在: {}（使用 --force 覆盖）", file.display());
        }

        let mut config = SessionConfig::default();
        if let Some(port) = &connect.port {
            config.port = Some(port.clone());
        }
        if let Some(baud) = connect.baud {
            config.baud_rate = baud;
        }
        config.profile = connect.profile.clone();
        config.save(&file).context("写入配置文件失败")?;

        println!("✅ 已写入 {}", file.display());
        Ok(())
    }
}
