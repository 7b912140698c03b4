//! Scanrig SDK - 串口扫描平台 Rust SDK
//!
//! 把用户编辑的扫描路径翻译为设备指令，并以"运动完成才发下一条"的节奏
//! 通过串口发送给 G-code 风格的龙门扫描平台。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **传输层** (`serial`): 面向行的设备传输，支持真实串口、模拟平台与 Mock
//! - **协议层** (`protocol`): 机器配置、指令模板与指令编译器
//! - **路径层** (`path`): 网格吸附的航点链表，含持久化
//! - **驱动层** (`driver`): 后台调度线程、运动闸门、事件与指标
//! - **会话层** (`control`): 连接、扫描、定时扫描、点动、急停
//!
//! # 快速开始
//!
//! ```no_run
//! use scanrig_sdk::prelude::*;
//!
//! # fn main() -> Result<(), SessionError> {
//! scanrig_sdk::init_logger();
//!
//! let mut session = Session::new(MachineProfile::gcode_default());
//! session.path_mut().append(100.0, 0.0, None, None);
//! session.path_mut().append(100.0, 100.0, None, Some(Action::CapturePhoto));
//!
//! let _sim = session.connect_simulated()?;
//! session.start_scan(AxisSet::XY)?;
//! # Ok(())
//! # }
//! ```
//!
//! 需要直接驱动调度器的用户可以使用驱动层：
//!
//! ```rust
//! use scanrig_sdk::driver::{Dispatcher, DispatcherConfig};
//! ```

// 内部模块结构（按层划分）
pub use scanrig_control as control;
pub use scanrig_driver as driver;
pub use scanrig_path as path;
pub use scanrig_protocol as protocol;
pub use scanrig_serial as serial;

// Prelude 模块
pub mod prelude;

// --- 用户以此为界 ---

// 传输层常用类型
pub use serial::{Transport, TransportError};

// 协议层
pub use protocol::{Action, Command, InstructionCompiler, MachineProfile, ProtocolError};

// 路径层
pub use path::{Path, PathError, WaypointId};

// 驱动层
pub use driver::{DispatchError, DispatchEvent, Dispatcher, DispatcherConfig};

// 会话层（推荐入口）
pub use control::{Session, SessionConfig, SessionError};

use tracing_subscriber::EnvFilter;

/// 默认日志过滤规则（`RUST_LOG` 未设置时使用）
pub const DEFAULT_LOG_FILTER: &str = "scanrig=info";

/// 初始化全局日志
///
/// - `tracing-subscriber` 的 fmt 输出，过滤规则取自 `RUST_LOG`，缺省为 [`DEFAULT_LOG_FILTER`]
/// - `log` crate 的记录经 `tracing-log` 转发
///
/// 重复调用是安全的：已有全局订阅者时只记录一条 debug 日志。
pub fn init_logger() {
    init_logger_with(DEFAULT_LOG_FILTER);
}

/// 以指定的缺省过滤规则初始化日志
pub fn init_logger_with(default_filter: &str) {
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge already installed: {}", e);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
    {
        tracing::debug!("global subscriber already set: {}", e);
    }
}
