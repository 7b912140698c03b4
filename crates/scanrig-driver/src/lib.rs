//! 调度层模块
//!
//! 本模块提供扫描平台的运动调度功能，包括：
//! - 调度线程管理（唯一持有传输层的线程）
//! - 命令队列（FIFO，可窥视队首）
//! - 运动闸门：根据两次位置查询之间的位移判断机器是否仍在运动
//! - 状态同步（ArcSwap 无锁读取最新位置）
//! - 事件钩子：位置更新、命令发出、回复、致命故障
//!
//! # 使用场景
//!
//! 路径编译成命令后交给 [`Dispatcher::enqueue`]，之后由调度线程按节奏发出。
//! 大多数用户应该使用 `scanrig-control` 提供的 `Session`。

mod dispatcher;
mod error;
pub mod hooks;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod state;

pub use dispatcher::{DispatchHandle, Dispatcher};
pub use error::DispatchError;
pub use hooks::{ChannelHook, DispatchCallback, DispatchEvent, HookManager};
pub use metrics::{DispatcherMetrics, MetricsSnapshot};
pub use pipeline::{DispatchLoop, DispatcherConfig, InfoQuery, dispatch_loop};
pub use queue::CommandQueue;
pub use state::{AtomicDispatcherState, DispatchContext, DispatcherState, MotionState};
