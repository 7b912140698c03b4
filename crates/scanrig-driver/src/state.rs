//! 调度器共享状态
//!
//! [`DispatchContext`] 在调用方与调度线程之间共享：
//! 命令队列、最新运动快照（ArcSwap 无锁读取）、取消标志、钩子、指标与故障信息。

use crate::hooks::{DispatchEvent, HookManager};
use crate::metrics::DispatcherMetrics;
use crate::queue::CommandQueue;
use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::RwLock;
use scanrig_protocol::Position;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Instant;

/// 调度器状态
///
/// `Idle → Polling ⇄ Draining → Stopped`
///
/// - **Idle**: 已创建，调度线程尚未开始第一轮
/// - **Polling**: 正在查询位置或两轮之间休眠
/// - **Draining**: 正在发送队首命令（及读取其回复）
/// - **Stopped**: 调度线程已退出（关闭或致命故障）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DispatcherState {
    #[default]
    Idle = 0,
    Polling = 1,
    Draining = 2,
    Stopped = 3,
}

impl DispatcherState {
    /// 从 u8 转换，无效值视为 Stopped
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Polling,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Polling | Self::Draining)
    }
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// 调度器状态（原子版本，用于线程间共享）
#[derive(Debug)]
pub struct AtomicDispatcherState {
    inner: AtomicU8,
}

impl AtomicDispatcherState {
    pub fn new(state: DispatcherState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> DispatcherState {
        DispatcherState::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, state: DispatcherState, ordering: Ordering) {
        self.inner.store(state.as_u8(), ordering);
    }
}

impl Default for AtomicDispatcherState {
    fn default() -> Self {
        Self::new(DispatcherState::Idle)
    }
}

/// 运动快照
///
/// `delta` 是最近两次有效位置查询之间各轴位移的平方和，
/// 也是判断"机器仍在运动"的唯一依据。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionState {
    pub position: Position,
    pub delta: f64,
    /// 最近一次有效位置查询的时间（尚未收到时为 `None`）
    pub updated_at: Option<Instant>,
}

impl Default for MotionState {
    fn default() -> Self {
        Self {
            position: Position::ORIGIN,
            delta: 0.0,
            updated_at: None,
        }
    }
}

impl MotionState {
    /// 按新位置计算下一份快照
    pub fn advance(&self, position: Position) -> Self {
        Self {
            position,
            delta: self.position.squared_distance(&position),
            updated_at: Some(Instant::now()),
        }
    }

    pub fn is_moving(&self, epsilon: f64) -> bool {
        self.delta > epsilon
    }
}

/// 调度上下文
pub struct DispatchContext {
    pub queue: CommandQueue,
    pub motion: ArcSwap<MotionState>,
    pub state: AtomicDispatcherState,
    /// `stop()` 请求标志，调度线程在每次出队前检查
    pub cancel: AtomicBool,
    pub hooks: RwLock<HookManager>,
    pub metrics: DispatcherMetrics,
    /// 最近一次致命错误的描述
    pub last_error: ArcSwapOption<String>,
}

impl DispatchContext {
    pub fn new() -> Self {
        Self {
            queue: CommandQueue::new(),
            motion: ArcSwap::from_pointee(MotionState::default()),
            state: AtomicDispatcherState::default(),
            cancel: AtomicBool::new(false),
            hooks: RwLock::new(HookManager::new()),
            metrics: DispatcherMetrics::new(),
            last_error: ArcSwapOption::empty(),
        }
    }

    pub fn motion(&self) -> MotionState {
        **self.motion.load()
    }

    pub fn dispatcher_state(&self) -> DispatcherState {
        self.state.get(Ordering::Acquire)
    }

    pub(crate) fn set_state(&self, state: DispatcherState) {
        self.state.set(state, Ordering::Release);
    }

    pub fn emit(&self, event: &DispatchEvent) {
        self.hooks.read().trigger_all(event);
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.load_full().map(|e| (*e).clone())
    }

    pub(crate) fn record_failure(&self, message: String) {
        self.last_error.store(Some(Arc::new(message.clone())));
        self.emit(&DispatchEvent::Failed(message));
    }
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::new()
    }
}
