//! 连接参数与会话建立
//!
//! 所有需要设备的子命令共用同一组全局参数：配置文件、串口、波特率、
//! 机器配置与模拟模式。命令行参数优先于配置文件。

use anyhow::{Context, Result, bail};
use clap::Args;
use scanrig_sdk::serial::SimulatorHandle;
use scanrig_sdk::{Session, SessionConfig};
use std::path::PathBuf;
use tracing::debug;

/// 配置目录
pub fn config_dir() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("scanrig");
    Ok(path)
}

/// 默认配置文件路径
pub fn default_config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// 全局连接参数
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// 会话配置文件（缺省为 <config_dir>/scanrig/config.toml）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 串口（覆盖配置）
    #[arg(long, global = true)]
    pub port: Option<String>,

    /// 波特率（覆盖配置）
    #[arg(long, global = true)]
    pub baud: Option<u32>,

    /// 机器配置文件（覆盖配置）
    #[arg(long, global = true)]
    pub profile: Option<PathBuf>,

    /// 使用软件模拟平台代替串口
    #[arg(long, global = true)]
    pub simulate: bool,
}

impl ConnectArgs {
    pub fn config_file(&self) -> Result<PathBuf> {
        match &self.config {
            Some(file) => Ok(file.clone()),
            None => default_config_file(),
        }
    }

    /// 读取配置并应用命令行覆盖
    ///
    /// 默认配置文件不存在时使用默认值；显式指定的文件必须存在。
    pub fn load_config(&self) -> Result<SessionConfig> {
        let file = self.config_file()?;
        let mut config = if file.exists() {
            SessionConfig::load(&file)
                .with_context(|| format!("读取配置文件失败: {}", file.display()))?
        } else if self.config.is_some() {
            bail!("配置文件不存在: {}", file.display());
        } else {
            debug!("No config at {}, using defaults", file.display());
            SessionConfig::default()
        };

        if let Some(port) = &self.port {
            config.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(profile) = &self.profile {
            config.profile = Some(profile.clone());
        }
        config.validate()?;
        Ok(config)
    }

    /// 读取配置并创建（未连接的）会话
    pub fn session(&self) -> Result<(Session, SessionConfig)> {
        let config = self.load_config()?;
        let session = Session::from_config(&config).context("加载机器配置失败")?;
        Ok((session, config))
    }

    /// 连接串口或模拟平台
    ///
    /// 模拟模式返回模拟器句柄。
    pub fn connect(
        &self,
        session: &mut Session,
        config: &SessionConfig,
    ) -> Result<Option<SimulatorHandle>> {
        if self.simulate {
            println!("🧪 连接模拟平台 ({})", session.profile().name);
            return Ok(Some(session.connect_simulated()?));
        }

        let Some(port) = config.port.as_deref() else {
            bail!("未指定串口：使用 --port、配置文件中的 port，或 --simulate");
        };
        println!("🔌 连接 {} @ {} baud...", port, config.baud_rate);
        session
            .connect_serial(port, config.baud_rate)
            .with_context(|| format!("打开串口 {} 失败", port))?;
        Ok(None)
    }

    /// 创建会话并连接
    pub fn open(&self) -> Result<(Session, SessionConfig)> {
        let (mut session, config) = self.session()?;
        self.connect(&mut session, &config)?;
        println!("✅ 已连接");
        Ok((session, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_missing_config_is_error() {
        let args = ConnectArgs {
            config: Some(PathBuf::from("/nonexistent/scanrig/config.toml")),
            ..Default::default()
        };
        assert!(args.load_config().is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        std::fs::write(&file, "port = \"/dev/ttyUSB0\"\nbaud-rate = 9600\n").unwrap();

        let args = ConnectArgs {
            config: Some(file),
            port: Some("/dev/ttyACM1".to_string()),
            ..Default::default()
        };
        let config = args.load_config().unwrap();
        assert_eq!(config.port.as_deref(), Some("/dev/ttyACM1"));
        assert_eq!(config.baud_rate, 9600);
    }

    #[test]
    fn test_zero_baud_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        std::fs::write(&file, "").unwrap();
        let args = ConnectArgs {
            config: Some(file),
            baud: Some(0),
            ..Default::default()
        };
        assert!(args.load_config().is_err());
    }

    #[test]
    fn test_connect_without_port_fails() {
        let args = ConnectArgs::default();
        let mut session = Session::new(scanrig_sdk::MachineProfile::gcode_default());
        let config = SessionConfig::default();
        assert!(args.connect(&mut session, &config).is_err());
        assert!(!session.is_connected());
    }
}
