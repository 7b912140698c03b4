//! # Scanrig Control
//!
//! 会话层：把路径模型、指令编译器与运动调度器串成完整的扫描流程。
//!
//! ## 包含模块
//!
//! - `session` - 连接管理、扫描/往返扫描/定时扫描、点动、急停
//! - `scheduler` - 定时扫描线程
//! - `config` - TOML 会话配置
//!
//! ## 示例
//!
//! ```rust,no_run
//! use scanrig_control::Session;
//! use scanrig_protocol::{AxisSet, MachineProfile};
//!
//! # fn main() -> Result<(), scanrig_control::SessionError> {
//! let mut session = Session::new(MachineProfile::gcode_default());
//! session.connect_simulated()?;
//! session.path_mut().append(100.0, 0.0, None, None);
//! session.path_mut().append(100.0, 100.0, None, None);
//! session.start_scan(AxisSet::XY)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod scheduler;
pub mod session;

pub use config::{DispatcherSettings, ScanSettings, SessionConfig};
pub use scheduler::ScanScheduler;
pub use session::Session;

use scanrig_driver::DispatchError;
use scanrig_path::PathError;
use scanrig_protocol::ProtocolError;
use scanrig_serial::TransportError;
use thiserror::Error;

/// 会话层错误类型
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// 尚未连接（或调度器已退出，需要重连）
    #[error("Not connected")]
    NotConnected,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
