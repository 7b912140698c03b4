//! 会话配置
//!
//! TOML 格式，所有字段都有默认值：
//!
//! ```toml
//! port = "/dev/ttyACM0"
//! baud-rate = 115200
//! profile = "profiles/gcode_gantry.toml"
//!
//! [dispatcher]
//! poll-interval-ms = 100
//! movement-epsilon = 1e-5
//! # settle-timeout-ms = 30000
//!
//! [scan]
//! distance = 200.0
//! axis = "x"
//! interval-secs = 600
//! path-axes = "xy"
//! settle-ms = 1000
//! ```

use crate::SessionError;
use scanrig_driver::DispatcherConfig;
use scanrig_protocol::{Axis, AxisSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 会话配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SessionConfig {
    /// 串口名称
    pub port: Option<String>,
    pub baud_rate: u32,
    /// 机器配置文件；缺省使用内置 G-code 配置
    pub profile: Option<PathBuf>,
    pub dispatcher: DispatcherSettings,
    pub scan: ScanSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            profile: None,
            dispatcher: DispatcherSettings::default(),
            scan: ScanSettings::default(),
        }
    }
}

/// 调度器配置（可序列化版本）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DispatcherSettings {
    pub poll_interval_ms: u64,
    pub movement_epsilon: f64,
    pub settle_timeout_ms: Option<u64>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        DispatcherConfig::default().into()
    }
}

impl From<DispatcherConfig> for DispatcherSettings {
    fn from(config: DispatcherConfig) -> Self {
        Self {
            poll_interval_ms: config.poll_interval_ms,
            movement_epsilon: config.movement_epsilon,
            settle_timeout_ms: config.settle_timeout_ms,
        }
    }
}

impl From<&DispatcherSettings> for DispatcherConfig {
    fn from(settings: &DispatcherSettings) -> Self {
        Self {
            poll_interval_ms: settings.poll_interval_ms,
            movement_epsilon: settings.movement_epsilon,
            settle_timeout_ms: settings.settle_timeout_ms,
        }
    }
}

/// 扫描参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ScanSettings {
    /// 往返扫描距离
    pub distance: f64,
    /// 往返扫描轴
    pub axis: Axis,
    /// 定时扫描间隔（秒），0 表示只扫一次
    pub interval_secs: u64,
    /// 路径扫描使用的轴组合（如 "xy"、"xyz"）
    pub path_axes: String,
    /// 动作点的停留时间（毫秒）
    pub settle_ms: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            distance: 100.0,
            axis: Axis::X,
            interval_secs: 0,
            path_axes: "xy".to_string(),
            settle_ms: 1000,
        }
    }
}

impl ScanSettings {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }

    pub fn settle_duration(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn path_axes(&self) -> Result<AxisSet, SessionError> {
        self.path_axes
            .parse()
            .map_err(|e| SessionError::Config(format!("scan.path-axes: {e}")))
    }
}

impl SessionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, SessionError> {
        let config: Self = toml::from_str(text).map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SessionError> {
        let text =
            toml::to_string_pretty(self).map_err(|e| SessionError::Config(e.to_string()))?;
        if let Some(dir) = path.as_ref().parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, text)?;
        Ok(())
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        (&self.dispatcher).into()
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.baud_rate == 0 {
            return Err(SessionError::Config("baud-rate must be positive".into()));
        }
        if self.dispatcher.poll_interval_ms == 0 {
            return Err(SessionError::Config(
                "dispatcher.poll-interval-ms must be positive".into(),
            ));
        }
        let epsilon = self.dispatcher.movement_epsilon;
        if epsilon.is_nan() || epsilon < 0.0 {
            return Err(SessionError::Config(
                "dispatcher.movement-epsilon must be non-negative".into(),
            ));
        }
        self.scan.path_axes()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.dispatcher_config(), DispatcherConfig::default());
        assert_eq!(config.scan.interval(), None);
        assert_eq!(config.scan.path_axes().unwrap(), AxisSet::XY);
    }

    #[test]
    fn test_parse_full_config() {
        let config = SessionConfig::from_toml_str(
            r#"
            port = "/dev/ttyUSB0"
            baud-rate = 250000
            profile = "profiles/grbl_halfscale.toml"

            [dispatcher]
            poll-interval-ms = 50
            settle-timeout-ms = 30000

            [scan]
            distance = 250.0
            axis = "y"
            interval-secs = 3600
            path-axes = "xyz"
            "#,
        )
        .unwrap();

        assert_eq!(config.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.baud_rate, 250_000);
        let dispatcher = config.dispatcher_config();
        assert_eq!(dispatcher.poll_interval_ms, 50);
        assert_eq!(dispatcher.movement_epsilon, 1e-5);
        assert_eq!(dispatcher.settle_timeout_ms, Some(30_000));
        assert_eq!(config.scan.axis, Axis::Y);
        assert_eq!(config.scan.interval(), Some(Duration::from_secs(3600)));
        assert_eq!(config.scan.path_axes().unwrap(), AxisSet::XYZ);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            SessionConfig::from_toml_str("baud-rate = 0"),
            Err(SessionError::Config(_))
        ));
        assert!(matches!(
            SessionConfig::from_toml_str("[scan]\npath-axes = \"xw\""),
            Err(SessionError::Config(_))
        ));
        assert!(matches!(
            SessionConfig::from_toml_str("port = 5"),
            Err(SessionError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("config.toml");
        let mut config = SessionConfig::default();
        config.port = Some("COM3".to_string());
        config.scan.interval_secs = 60;
        config.save(&file).unwrap();

        assert_eq!(SessionConfig::load(&file).unwrap(), config);
    }
}
