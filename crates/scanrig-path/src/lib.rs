//! # Scanrig Path - 航点路径模型
//!
//! **依赖原则**: 只依赖 `scanrig-protocol`，不涉及任何 IO 线程或传输层。
//!
//! ## 包含模块
//!
//! - `path` - 双向链式航点序列（arena + 句柄实现）
//! - `record` - 持久化记录格式（JSON）
//!
//! 路径模型不做任何加锁：调用方应在自己的任务中串行修改它，
//! 调度器从不访问路径状态，只接收编译后的命令。

pub mod path;
pub mod record;

pub use path::{Path, PointKind, WaypointId};
pub use record::{WaypointRecord, load_records, save_records};

use thiserror::Error;

/// 路径模型错误
#[derive(Error, Debug)]
pub enum PathError {
    /// 引用的航点不在当前路径中（已删除或来自其他路径）
    #[error("Waypoint {0} is not part of this path")]
    InvalidAnchor(WaypointId),

    /// 链表结构损坏（只会在内部缺陷时出现）
    #[error("Path chain corrupted: {0}")]
    Corrupted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record format error: {0}")]
    Format(#[from] serde_json::Error),
}
