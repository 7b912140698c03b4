//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use scanrig_sdk::prelude::*;
//! ```

// 会话层（推荐使用）
pub use crate::control::{ScanScheduler, Session, SessionConfig};

// 路径与航点
pub use crate::path::{Path, WaypointId, WaypointRecord};
pub use crate::protocol::{Action, Axis, AxisSet, Position, Waypoint};

// 机器配置与编译
pub use crate::protocol::{Command, InstructionCompiler, MachineProfile};

// 调度器（高级用户使用）
pub use crate::driver::{
    DispatchEvent, DispatchHandle, Dispatcher, DispatcherConfig, DispatcherState, MetricsSnapshot,
};

// 传输层
pub use crate::serial::{SimulatedTransport, Transport};

// 错误类型
pub use crate::control::SessionError;
pub use crate::driver::DispatchError;
pub use crate::path::PathError;
pub use crate::protocol::ProtocolError;
pub use crate::serial::TransportError;
