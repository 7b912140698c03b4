//! 钩子系统
//!
//! 调度线程通过 [`HookManager`] 向外发布事件，核心不依赖任何 UI 事件循环。
//!
//! # 设计原则
//!
//! - **非阻塞**: 回调在调度线程内同步执行，必须立即返回（推荐 `try_send`）
//! - **职责分离**: `HookManager` 管理运行时回调，`DispatcherConfig` 保持为纯数据
//! - **多消费者**: 每个订阅者持有自己的 [`ChannelHook`] 与接收端
//!
//! # 使用示例
//!
//! ```rust
//! use scanrig_driver::hooks::{ChannelHook, DispatchCallback, DispatchEvent, HookManager};
//! use scanrig_protocol::Position;
//! use std::sync::Arc;
//!
//! let mut hooks = HookManager::new();
//! let (hook, rx) = ChannelHook::new();
//! hooks.add_callback(Arc::new(hook) as Arc<dyn DispatchCallback>);
//!
//! hooks.trigger_all(&DispatchEvent::PositionUpdated(Position::new(1.0, 2.0, 0.0)));
//! assert!(matches!(rx.try_recv(), Ok(DispatchEvent::PositionUpdated(_))));
//! ```

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use scanrig_protocol::{Command, Position};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// 调度事件
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// 位置查询成功（设备坐标）
    PositionUpdated(Position),
    /// 命令已写入传输层（带发送时的位置快照）
    CommandDispatched(Command),
    /// 需要回复的命令收到的原始回复
    ResponseReceived(String),
    /// 调度线程因致命错误退出
    Failed(String),
}

/// 事件回调 Trait
///
/// # 性能要求
///
/// - 在调度线程内同步执行，禁止阻塞
/// - 推荐使用 `crossbeam_channel::Sender::try_send`
pub trait DispatchCallback: Send + Sync {
    fn on_event(&self, event: &DispatchEvent);

    /// 订阅端是否已经关闭（关闭后会被 [`HookManager::prune`] 移除）
    fn is_closed(&self) -> bool {
        false
    }
}

/// 钩子管理器
///
/// 回调列表本身不是线程安全的，需要外部同步（调度上下文中用 `RwLock` 包裹）。
#[derive(Default)]
pub struct HookManager {
    callbacks: Vec<Arc<dyn DispatchCallback>>,
}

impl HookManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub fn add_callback(&mut self, callback: Arc<dyn DispatchCallback>) {
        self.callbacks.push(callback);
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    /// 移除已关闭的订阅者
    pub fn prune(&mut self) {
        self.callbacks.retain(|cb| !cb.is_closed());
    }

    /// 触发所有回调（在调度线程中调用）
    pub fn trigger_all(&self, event: &DispatchEvent) {
        for callback in self.callbacks.iter() {
            callback.on_event(event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

/// 基于 Channel 的事件订阅钩子
///
/// 使用有界通道：消费者跟不上时丢弃事件而不是阻塞调度线程，
/// 丢弃数量可通过 [`ChannelHook::dropped_events`] 监控。
pub struct ChannelHook {
    tx: Sender<DispatchEvent>,
    dropped_events: Arc<AtomicU64>,
    closed: AtomicBool,
}

impl ChannelHook {
    /// 默认队列容量
    pub const DEFAULT_CAPACITY: usize = 4096;

    #[must_use]
    pub fn new() -> (Self, Receiver<DispatchEvent>) {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Self, Receiver<DispatchEvent>) {
        let (tx, rx) = bounded(capacity);
        let hook = Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
            closed: AtomicBool::new(false),
        };
        (hook, rx)
    }

    #[must_use]
    pub fn dropped_events(&self) -> &Arc<AtomicU64> {
        &self.dropped_events
    }
}

impl DispatchCallback for ChannelHook {
    fn on_event(&self, event: &DispatchEvent) {
        match self.tx.try_send(event.clone()) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
            },
            Err(TrySendError::Disconnected(_)) => {
                self.closed.store(true, Ordering::Relaxed);
            },
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}
