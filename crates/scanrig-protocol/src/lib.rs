//! # Scanrig Protocol
//!
//! 串口扫描平台的协议层（无硬件依赖）
//!
//! ## 模块
//!
//! - `types`: 轴、轴组合、位置
//! - `action`: 航点动作
//! - `command`: 调度命令
//! - `waypoint`: 航点值类型
//! - `profile`: 机器配置（尺寸、缩放、指令模板）
//! - `template`: 指令模板渲染
//! - `info`: 位置查询回复解析
//! - `compiler`: 指令编译器（航点 / 增量 → 指令文本）
//!
//! ## 数据流
//!
//! ```text
//! Path 快照 (Vec<Waypoint>)
//!     ↓ InstructionCompiler + MachineProfile
//! Vec<Command>
//!     ↓ Dispatcher::enqueue
//! 串口
//! ```

pub mod action;
pub mod command;
pub mod compiler;
pub mod info;
pub mod profile;
pub mod template;
pub mod types;
pub mod waypoint;

pub use action::Action;
pub use command::Command;
pub use compiler::{DEFAULT_SETTLE_DURATION, InstructionCompiler, WaypointCommands};
pub use info::InfoParser;
pub use profile::{Dimensions, InfoSpec, InstructionSet, MachineProfile, ScaleFactor};
pub use types::{Axis, AxisSet, Position};
pub use waypoint::Waypoint;

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid axis: {0:?}")]
    InvalidAxis(String),

    #[error("Unknown placeholder {{{name}}} in template {template:?}")]
    UnknownPlaceholder { template: String, name: String },

    #[error("Profile has no {kind} template for axes {axes:?}")]
    MissingTemplate { kind: &'static str, axes: String },

    #[error("Invalid info regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("Invalid info order: {0}")]
    InvalidInfoOrder(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Profile parse error: {0}")]
    ProfileParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::UnknownPlaceholder {
            template: "G0 X{q}".to_string(),
            name: "q".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown placeholder {q} in template \"G0 X{q}\""
        );

        let err = ProtocolError::MissingTemplate {
            kind: "absolute",
            axes: "xz".to_string(),
        };
        assert!(err.to_string().contains("absolute"));
        assert!(err.to_string().contains("xz"));
    }
}
