//! 调度器性能指标
//!
//! 原子计数器，可以在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 调度器实时指标
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// 成功解析的位置查询次数
    pub pings: AtomicU64,

    /// 未得到有效位置的查询次数（回复不匹配或读超时）
    pub missed_pings: AtomicU64,

    /// 已写入传输层的命令数（不含位置查询）
    pub commands_sent: AtomicU64,

    /// 因 `stop()` / 急停 / `clear()` 丢弃的命令数
    pub commands_discarded: AtomicU64,

    /// 队首命令被运动闸门挡住的轮数
    pub gate_holds: AtomicU64,

    /// 闸门等待超时后被强制放行的次数
    pub gate_timeouts: AtomicU64,

    /// 收到的命令回复数
    pub responses: AtomicU64,
}

impl DispatcherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pings: self.pings.load(Ordering::Relaxed),
            missed_pings: self.missed_pings.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            commands_discarded: self.commands_discarded.load(Ordering::Relaxed),
            gate_holds: self.gate_holds.load(Ordering::Relaxed),
            gate_timeouts: self.gate_timeouts.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.pings.store(0, Ordering::Relaxed);
        self.missed_pings.store(0, Ordering::Relaxed);
        self.commands_sent.store(0, Ordering::Relaxed);
        self.commands_discarded.store(0, Ordering::Relaxed);
        self.gate_holds.store(0, Ordering::Relaxed);
        self.gate_timeouts.store(0, Ordering::Relaxed);
        self.responses.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn incr(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub pings: u64,
    pub missed_pings: u64,
    pub commands_sent: u64,
    pub commands_discarded: u64,
    pub gate_holds: u64,
    pub gate_timeouts: u64,
    pub responses: u64,
}

impl MetricsSnapshot {
    /// 位置查询丢失率（百分比）
    ///
    /// 没有任何查询时返回 0.0。
    pub fn missed_ping_rate(&self) -> f64 {
        let total = self.pings + self.missed_pings;
        if total == 0 {
            return 0.0;
        }
        (self.missed_pings as f64 / total as f64) * 100.0
    }
}
