//! 调度器 API 模块
//!
//! 提供对外的 `Dispatcher` 结构体，封装调度线程和状态同步细节。

use crate::error::DispatchError;
use crate::hooks::{ChannelHook, DispatchCallback, DispatchEvent};
use crate::metrics::{DispatcherMetrics, MetricsSnapshot};
use crate::pipeline::{DispatchLoop, DispatcherConfig, InfoQuery, dispatch_loop};
use crate::state::{DispatchContext, DispatcherState, MotionState};
use crossbeam_channel::Receiver;
use scanrig_protocol::{Command, MachineProfile, Position};
use scanrig_serial::Transport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Drop 时等待调度线程退出的最长时间
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        let (tx, rx) = crossbeam_channel::bounded(1);

        spawn(move || {
            let _ = tx.send(self.join().map(|_| ()));
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Err(Box::new(
                std::io::Error::new(std::io::ErrorKind::TimedOut, "Thread join timeout"),
            )),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "Thread panicked during join",
                )))
            },
        }
    }
}

/// 运动调度器（对外 API）
///
/// 创建时把传输层移交给后台调度线程，之后只有该线程读写传输层。
/// 调用方通过命令队列与事件订阅和它交互。
///
/// Drop 时先停止并等待调度线程，再释放传输层，避免写入与拆除竞争。
pub struct Dispatcher {
    handle: DispatchHandle,
    ctx: Arc<DispatchContext>,
    /// 运行标志（用于线程生命周期联动）
    is_running: Arc<AtomicBool>,
    io_thread: Option<JoinHandle<()>>,
    config: DispatcherConfig,
}

/// 调度器的可克隆句柄
///
/// 只能操作命令队列与取消标志，不持有调度线程；可以交给其他线程（如定时扫描）。
#[derive(Clone)]
pub struct DispatchHandle {
    ctx: Arc<DispatchContext>,
    is_running: Arc<AtomicBool>,
}

impl DispatchHandle {
    /// 批量入队（保持顺序）
    ///
    /// 调度线程已停止时返回 `NotRunning`，命令不会入队。
    pub fn enqueue<I>(&self, commands: I) -> Result<usize, DispatchError>
    where
        I: IntoIterator<Item = Command>,
    {
        self.ensure_running()?;
        let added = self.ctx.queue.extend(commands);
        debug!("Enqueued {} commands ({} pending)", added, self.ctx.queue.len());
        Ok(added)
    }

    pub fn enqueue_one(&self, command: Command) -> Result<(), DispatchError> {
        self.enqueue(std::iter::once(command)).map(|_| ())
    }

    /// 立即清空队列（普通的"停止扫描"）
    pub fn clear(&self) -> usize {
        let discarded = self.ctx.queue.clear();
        DispatcherMetrics::incr(&self.ctx.metrics.commands_discarded, discarded as u64);
        debug!("Cleared {} queued commands", discarded);
        discarded
    }

    /// 请求取消
    ///
    /// 调度线程在下一次出队前看到该标志，丢弃队列剩余命令后清除标志。
    pub fn stop(&self) {
        self.ctx.cancel.store(true, Ordering::Release);
    }

    /// 急停：清空队列并放入即时停止指令（原子操作）
    ///
    /// 同时撤销尚未生效的 [`stop`](Self::stop) 请求，停止指令总会发出。
    pub fn emergency_stop(&self, stop: Command) -> Result<(), DispatchError> {
        self.ensure_running()?;
        let mut stop = stop;
        stop.instant = true;
        let discarded = self.ctx.queue.replace_with_reset(stop, &self.ctx.cancel);
        DispatcherMetrics::incr(&self.ctx.metrics.commands_discarded, discarded as u64);
        warn!("Emergency stop, discarded {} queued commands", discarded);
        Ok(())
    }

    pub fn queue_len(&self) -> usize {
        self.ctx.queue.len()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> Result<(), DispatchError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(DispatchError::NotRunning)
        }
    }
}

impl Dispatcher {
    /// 启动调度器
    ///
    /// # 参数
    /// - `transport`: 已连接的传输层（会被移动到调度线程）
    /// - `info`: 位置查询指令与解析器
    /// - `config`: 调度配置
    pub fn start<T>(
        transport: T,
        info: InfoQuery,
        config: DispatcherConfig,
    ) -> Result<Self, DispatchError>
    where
        T: Transport + Send + 'static,
    {
        let ctx = Arc::new(DispatchContext::new());
        let is_running = Arc::new(AtomicBool::new(true));

        let dispatch = DispatchLoop::new(transport, info, ctx.clone(), config.clone());
        let running = is_running.clone();
        let io_thread = std::thread::Builder::new()
            .name("scanrig-dispatch".to_string())
            .spawn(move || dispatch_loop(dispatch, running))
            .map_err(|e| DispatchError::IoThread(e.to_string()))?;

        info!(
            "Dispatcher started (poll {} ms, epsilon {})",
            config.poll_interval_ms, config.movement_epsilon
        );
        Ok(Self {
            handle: DispatchHandle {
                ctx: ctx.clone(),
                is_running: is_running.clone(),
            },
            ctx,
            is_running,
            io_thread: Some(io_thread),
            config,
        })
    }

    /// 按机器配置启动（位置查询取自 `instructions.info`）
    pub fn for_profile<T>(
        transport: T,
        profile: &MachineProfile,
        config: DispatcherConfig,
    ) -> Result<Self, DispatchError>
    where
        T: Transport + Send + 'static,
    {
        Self::start(transport, InfoQuery::from_profile(profile)?, config)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// 可克隆句柄（队列操作）
    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    pub fn enqueue<I>(&self, commands: I) -> Result<usize, DispatchError>
    where
        I: IntoIterator<Item = Command>,
    {
        self.handle.enqueue(commands)
    }

    pub fn enqueue_one(&self, command: Command) -> Result<(), DispatchError> {
        self.handle.enqueue_one(command)
    }

    pub fn clear(&self) -> usize {
        self.handle.clear()
    }

    pub fn stop(&self) {
        self.handle.stop()
    }

    pub fn emergency_stop(&self, stop: Command) -> Result<(), DispatchError> {
        self.handle.emergency_stop(stop)
    }

    /// 订阅调度事件
    pub fn subscribe(&self) -> Receiver<DispatchEvent> {
        let (hook, rx) = ChannelHook::new();
        let mut hooks = self.ctx.hooks.write();
        hooks.prune();
        hooks.add_callback(Arc::new(hook));
        rx
    }

    /// 注册自定义回调
    pub fn add_callback(&self, callback: Arc<dyn DispatchCallback>) {
        self.ctx.hooks.write().add_callback(callback);
    }

    /// 最新位置（无锁读取）
    pub fn last_position(&self) -> Position {
        self.ctx.motion().position
    }

    /// 最近一次位移平方和
    pub fn movement_delta(&self) -> f64 {
        self.ctx.motion().delta
    }

    pub fn motion(&self) -> MotionState {
        self.ctx.motion()
    }

    pub fn is_moving(&self) -> bool {
        self.ctx.motion().is_moving(self.config.movement_epsilon)
    }

    pub fn queue_len(&self) -> usize {
        self.handle.queue_len()
    }

    /// 待发送命令快照
    pub fn pending(&self) -> Vec<Command> {
        self.ctx.queue.snapshot()
    }

    pub fn state(&self) -> DispatcherState {
        self.ctx.dispatcher_state()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// 调度线程存活且没有记录致命错误
    pub fn is_healthy(&self) -> bool {
        let alive = self.io_thread.as_ref().is_some_and(|h| !h.is_finished());
        alive && self.is_running() && self.ctx.last_error().is_none()
    }

    /// 导致调度线程退出的错误描述
    pub fn last_error(&self) -> Option<String> {
        self.ctx.last_error()
    }

    /// 等待队列发完且机器静止
    ///
    /// 超时返回 `Timeout`；调度线程退出返回 `NotRunning`。
    pub fn wait_until_idle(&self, timeout: Duration) -> Result<(), DispatchError> {
        let deadline = Instant::now() + timeout;
        loop {
            self.handle.ensure_running()?;
            if self.ctx.queue.is_empty() && !self.is_moving() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DispatchError::Timeout);
            }
            spin_sleep::sleep(Duration::from_millis(5));
        }
    }

    /// 停止调度线程并等待其退出
    pub fn shutdown(mut self) {
        self.stop_thread();
    }

    fn stop_thread(&mut self) {
        self.is_running.store(false, Ordering::Release);
        if let Some(handle) = self.io_thread.take() {
            if let Err(_e) = handle.join_timeout(JOIN_TIMEOUT) {
                error!(
                    "Dispatch thread panicked or failed to shut down within {:?}",
                    JOIN_TIMEOUT
                );
            } else {
                debug!("Dispatch thread joined");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop_thread();
    }
}
