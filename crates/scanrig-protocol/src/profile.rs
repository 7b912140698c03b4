//! # 机器配置（Machine Profile）
//!
//! 描述一台扫描平台的物理尺寸、单位缩放和指令模板集合。
//! 对核心而言只读；通常由外部从配置文件加载。
//!
//! ## 文件格式（TOML）
//!
//! ```toml
//! name = "gcode-gantry"
//! units-scale = 1.0
//! default-speed = 1500
//!
//! [dimensions]
//! x-axis = 600
//! y-axis = 400
//! grid-size = 50
//!
//! [scale-factor]
//! x = 1.0
//! y = 1.0
//! z = 1.0
//!
//! [instructions]
//! connect = "G21"
//! stop = "M112"
//! set-home = "G92 X0 Y0 Z0"
//! wait = "G4 P{duration}"
//!
//! [instructions.info]
//! command = "M114"
//! regex = 'X:(-?[0-9.]+) Y:(-?[0-9.]+) Z:(-?[0-9.]+)'
//! order = ["x", "y", "z"]
//!
//! [instructions.absolute]
//! xy = "G90 G0 X{x} Y{y} F{speed}"
//!
//! [instructions.relative]
//! x = "G91 G0 X{x} F{speed}"
//! ```

use crate::ProtocolError;
use crate::info::InfoParser;
use crate::template;
use crate::types::{Axis, AxisSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

fn one() -> f64 {
    1.0
}

/// 机器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MachineProfile {
    /// 配置名称（仅用于显示）
    #[serde(default)]
    pub name: String,

    /// 物理尺寸与网格间距
    pub dimensions: Dimensions,

    /// 全局单位缩放（逻辑坐标 → 设备单位）
    #[serde(default = "one")]
    pub units_scale: f64,

    /// 默认进给速度，填入模板的 `{speed}` 占位符
    pub default_speed: f64,

    /// 各轴缩放系数（缺省为 1）
    #[serde(default)]
    pub scale_factor: ScaleFactor,

    /// 指令模板集合
    pub instructions: InstructionSet,
}

/// 物理尺寸
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Dimensions {
    pub x_axis: f64,
    pub y_axis: f64,
    /// 网格间距：所有进入路径的坐标都吸附到该间距的整数倍
    pub grid_size: f64,
}

/// 各轴缩放系数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactor {
    #[serde(default = "one")]
    pub x: f64,
    #[serde(default = "one")]
    pub y: f64,
    #[serde(default = "one")]
    pub z: f64,
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self {
            x: 1.0,
            y: 1.0,
            z: 1.0,
        }
    }
}

impl ScaleFactor {
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// 指令模板集合
///
/// `absolute` / `relative` 以轴组合键（`x`、`xy`、`xyz` …）索引。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstructionSet {
    #[serde(default)]
    pub connect: String,
    pub stop: String,
    pub set_home: String,
    /// 等待模板，占位符 `{duration}`（毫秒）
    pub wait: String,
    pub info: InfoSpec,
    #[serde(default)]
    pub absolute: BTreeMap<String, String>,
    #[serde(default)]
    pub relative: BTreeMap<String, String>,
}

/// 位置查询指令及其回复解析规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoSpec {
    pub command: String,
    /// 回复匹配正则，捕获组按 `order` 对应到各轴
    pub regex: String,
    pub order: Vec<Axis>,
}

impl MachineProfile {
    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(text: &str) -> Result<Self, ProtocolError> {
        let profile: MachineProfile = toml::from_str(text)?;
        profile.validate()?;
        Ok(profile)
    }

    /// 从文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProtocolError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let profile = Self::from_toml_str(&text)?;
        debug!("Loaded machine profile {:?} from {}", profile.name, path.display());
        Ok(profile)
    }

    /// 内置的通用 G-code 平台配置
    ///
    /// 与 `SimulatedTransport` 的回复格式一致，便于离线调试。
    pub fn gcode_default() -> Self {
        let absolute = [
            ("x", "G90 G0 X{x} F{speed}"),
            ("y", "G90 G0 Y{y} F{speed}"),
            ("z", "G90 G0 Z{z} F{speed}"),
            ("xy", "G90 G0 X{x} Y{y} F{speed}"),
            ("xyz", "G90 G0 X{x} Y{y} Z{z} F{speed}"),
        ];
        let relative = [
            ("x", "G91 G0 X{x} F{speed}"),
            ("y", "G91 G0 Y{y} F{speed}"),
            ("z", "G91 G0 Z{z} F{speed}"),
        ];

        Self {
            name: "gcode-gantry".to_string(),
            dimensions: Dimensions {
                x_axis: 600.0,
                y_axis: 400.0,
                grid_size: 50.0,
            },
            units_scale: 1.0,
            default_speed: 1500.0,
            scale_factor: ScaleFactor::default(),
            instructions: InstructionSet {
                connect: "G21".to_string(),
                stop: "M112".to_string(),
                set_home: "G92 X0 Y0 Z0".to_string(),
                wait: "G4 P{duration}".to_string(),
                info: InfoSpec {
                    command: "M114".to_string(),
                    regex: r"X:(-?[0-9.]+) Y:(-?[0-9.]+) Z:(-?[0-9.]+)".to_string(),
                    order: vec![Axis::X, Axis::Y, Axis::Z],
                },
                absolute: absolute
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                relative: relative
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        }
    }

    /// 某轴的总缩放系数（`units-scale × scale-factor.axis`）
    pub fn scale(&self, axis: Axis) -> f64 {
        self.units_scale * self.scale_factor.get(axis)
    }

    /// 网格间距
    pub fn grid_step(&self) -> f64 {
        self.dimensions.grid_size
    }

    pub fn absolute_template(&self, axes: AxisSet) -> Result<&str, ProtocolError> {
        lookup_template(&self.instructions.absolute, "absolute", axes)
    }

    pub fn relative_template(&self, axes: AxisSet) -> Result<&str, ProtocolError> {
        lookup_template(&self.instructions.relative, "relative", axes)
    }

    /// 构建位置回复解析器
    pub fn info_parser(&self) -> Result<InfoParser, ProtocolError> {
        InfoParser::new(&self.instructions.info.regex, &self.instructions.info.order)
    }

    /// 校验配置的一致性
    ///
    /// - 尺寸与速度为有限值，网格间距非负
    /// - 位置回复正则可编译，`order` 与捕获组数量相符
    /// - 模板键是合法的轴组合，且只引用已知占位符
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let dims = &self.dimensions;
        for (field, value) in [
            ("dimensions.x-axis", dims.x_axis),
            ("dimensions.y-axis", dims.y_axis),
            ("dimensions.grid-size", dims.grid_size),
            ("units-scale", self.units_scale),
            ("default-speed", self.default_speed),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ProtocolError::InvalidProfile(format!(
                    "{field} must be a non-negative number, got {value}"
                )));
            }
        }

        self.info_parser()?;

        check_placeholders(&self.instructions.wait, &["duration"])?;
        for text in [
            &self.instructions.connect,
            &self.instructions.stop,
            &self.instructions.set_home,
            &self.instructions.info.command,
        ] {
            check_placeholders(text, &[])?;
        }

        for (kind, table) in [
            ("absolute", &self.instructions.absolute),
            ("relative", &self.instructions.relative),
        ] {
            for (key, text) in table {
                key.parse::<AxisSet>().map_err(|_| {
                    ProtocolError::InvalidProfile(format!("invalid {kind} template key {key:?}"))
                })?;
                check_placeholders(text, &["x", "y", "z", "speed"])?;
            }
        }

        Ok(())
    }
}

fn lookup_template<'a>(
    table: &'a BTreeMap<String, String>,
    kind: &'static str,
    axes: AxisSet,
) -> Result<&'a str, ProtocolError> {
    table
        .get(&axes.key())
        .map(String::as_str)
        .ok_or_else(|| ProtocolError::MissingTemplate {
            kind,
            axes: axes.key(),
        })
}

fn check_placeholders(text: &str, allowed: &[&str]) -> Result<(), ProtocolError> {
    match template::placeholders(text)
        .into_iter()
        .find(|name| !allowed.contains(&name.as_str()))
    {
        Some(name) => Err(ProtocolError::UnknownPlaceholder {
            template: text.to_string(),
            name,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name = "bench"
default-speed = 900

[dimensions]
x-axis = 300
y-axis = 200
grid-size = 25

[scale-factor]
y = 2.0

[instructions]
stop = "!"
set-home = "$H"
wait = "G4 P{duration}"

[instructions.info]
command = "?"
regex = 'MPos:(-?[0-9.]+),(-?[0-9.]+),(-?[0-9.]+)'
order = ["x", "y", "z"]

[instructions.absolute]
xy = "G0 X{x} Y{y}"

[instructions.relative]
x = "$J=G91 X{x} F{speed}"
"#;

    #[test]
    fn test_parse_sample_profile() {
        let profile = MachineProfile::from_toml_str(SAMPLE).unwrap();
        assert_eq!(profile.name, "bench");
        assert_eq!(profile.units_scale, 1.0);
        assert_eq!(profile.default_speed, 900.0);
        assert_eq!(profile.dimensions.grid_size, 25.0);
        assert_eq!(profile.scale_factor.x, 1.0);
        assert_eq!(profile.scale_factor.y, 2.0);
        assert_eq!(profile.scale_factor.z, 1.0);
        assert_eq!(profile.instructions.connect, "");
        assert_eq!(profile.instructions.set_home, "$H");
        assert_eq!(profile.absolute_template(AxisSet::XY).unwrap(), "G0 X{x} Y{y}");
    }

    #[test]
    fn test_missing_template() {
        let profile = MachineProfile::from_toml_str(SAMPLE).unwrap();
        match profile.absolute_template(AxisSet::XYZ) {
            Err(ProtocolError::MissingTemplate { kind, axes }) => {
                assert_eq!(kind, "absolute");
                assert_eq!(axes, "xyz");
            },
            other => panic!("expected MissingTemplate, got {:?}", other),
        }
    }

    #[test]
    fn test_scale_combines_units_and_axis() {
        let mut profile = MachineProfile::gcode_default();
        profile.units_scale = 0.5;
        profile.scale_factor.y = 4.0;
        assert_eq!(profile.scale(Axis::X), 0.5);
        assert_eq!(profile.scale(Axis::Y), 2.0);
    }

    #[test]
    fn test_gcode_default_is_valid() {
        let profile = MachineProfile::gcode_default();
        assert!(profile.validate().is_ok());
        assert!(profile.relative_template(AxisSet::X).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_placeholder() {
        let text = SAMPLE.replace("G0 X{x} Y{y}", "G0 X{x} Y{y} E{extrude}");
        let err = MachineProfile::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownPlaceholder { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_template_key() {
        let text = SAMPLE.replace("xy = \"G0", "xw = \"G0");
        let err = MachineProfile::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidProfile(_)));
    }

    #[test]
    fn test_validate_rejects_bad_regex() {
        let text = SAMPLE.replace("MPos:(", "MPos:((");
        assert!(MachineProfile::from_toml_str(&text).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let profile = MachineProfile::load(&path).unwrap();
        assert_eq!(profile.name, "bench");
    }

    #[test]
    fn test_serialize_round_trip() {
        let profile = MachineProfile::gcode_default();
        let text = toml::to_string(&profile).unwrap();
        let parsed = MachineProfile::from_toml_str(&text).unwrap();
        assert_eq!(parsed, profile);
    }
}
