//! 调度循环模块
//!
//! 负责后台调度线程的位置查询、闸门判断与命令发送逻辑。
//!
//! 每一轮（[`DispatchLoop::poll_once`]）：
//!
//! 1. **Ping**: 清空收发缓冲，写入位置查询指令，阻塞读取一行回复并解析。
//!    回复不匹配视为本轮未更新：位置与 `delta` 保持不变，不发事件、不报错。
//! 2. **闸门**: 队列为空则什么也不做；否则检查取消标志，再看队首命令：
//!    `delta > ε` 且命令不是即时命令时本轮不发送。否则出队、记录位置快照、
//!    写入传输层并发出 `CommandDispatched`；需要回复的命令再阻塞读取一行。
//!
//! 两轮之间休眠 `poll_interval`。

use crate::error::DispatchError;
use crate::hooks::DispatchEvent;
use crate::metrics::DispatcherMetrics;
use crate::queue::Gate;
use crate::state::{DispatchContext, DispatcherState};
use scanrig_protocol::{Command, InfoParser, MachineProfile, ProtocolError};
use scanrig_serial::{Transport, TransportError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 调度器配置
///
/// # Example
///
/// ```
/// use scanrig_driver::DispatcherConfig;
///
/// // 默认：100ms 轮询，ε = 1e-5，闸门无超时
/// let config = DispatcherConfig::default();
///
/// let config = DispatcherConfig {
///     poll_interval_ms: 50,
///     settle_timeout_ms: Some(30_000),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 运动判定阈值（位移平方和）
    pub movement_epsilon: f64,
    /// 闸门最长等待时间（毫秒）
    ///
    /// `None` 表示一直等到机器报告静止。设置后，队首命令被挡住超过该时间
    /// 会记录警告并放行。
    pub settle_timeout_ms: Option<u64>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            movement_epsilon: 1e-5,
            settle_timeout_ms: None,
        }
    }
}

impl DispatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_timeout(&self) -> Option<Duration> {
        self.settle_timeout_ms.map(Duration::from_millis)
    }
}

/// 位置查询：指令文本 + 回复解析器
#[derive(Debug, Clone)]
pub struct InfoQuery {
    pub command: String,
    pub parser: InfoParser,
}

impl InfoQuery {
    pub fn new(command: impl Into<String>, parser: InfoParser) -> Self {
        Self {
            command: command.into(),
            parser,
        }
    }

    /// 从机器配置构建
    pub fn from_profile(profile: &MachineProfile) -> Result<Self, ProtocolError> {
        Ok(Self::new(
            profile.instructions.info.command.clone(),
            profile.info_parser()?,
        ))
    }

    fn wire_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.command.len() + 1);
        bytes.extend_from_slice(self.command.as_bytes());
        bytes.push(b'\n');
        bytes
    }
}

/// 单个调度循环实例
///
/// 独占传输层。通常由 [`dispatch_loop`] 在后台线程中驱动，
/// 测试中可以直接调用 [`poll_once`](Self::poll_once) 逐轮推进。
pub struct DispatchLoop<T: Transport> {
    transport: T,
    info: InfoQuery,
    ctx: Arc<DispatchContext>,
    config: DispatcherConfig,
    /// 被闸门挡住的队首命令（纪元）及开始时间
    held: Option<(u64, Instant)>,
}

impl<T: Transport> DispatchLoop<T> {
    pub fn new(
        transport: T,
        info: InfoQuery,
        ctx: Arc<DispatchContext>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            transport,
            info,
            ctx,
            config,
            held: None,
        }
    }

    pub fn context(&self) -> &Arc<DispatchContext> {
        &self.ctx
    }

    /// 交还传输层（循环结束后）
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// 执行一轮：位置查询 + 至多发送一条命令
    ///
    /// 返回错误即表示传输层故障，循环不应继续。
    pub fn poll_once(&mut self) -> Result<(), DispatchError> {
        self.ctx.set_state(DispatcherState::Polling);
        self.ping()?;
        self.drain()
    }

    fn ping(&mut self) -> Result<(), DispatchError> {
        self.transport.flush_input()?;
        self.transport.flush_output()?;
        self.transport.write(&self.info.wire_bytes())?;

        let line = match self.transport.read_line_text() {
            Ok(line) => line,
            Err(TransportError::Timeout) => {
                trace!("Ping timed out, keeping last position");
                DispatcherMetrics::incr(&self.ctx.metrics.missed_pings, 1);
                return Ok(());
            },
            Err(e) => return Err(e.into()),
        };

        match self.info.parser.parse(&line) {
            Some(position) => {
                let next = self.ctx.motion().advance(position);
                self.ctx.motion.store(Arc::new(next));
                DispatcherMetrics::incr(&self.ctx.metrics.pings, 1);
                trace!("Ping: {} (delta {:.6})", position, next.delta);
                self.ctx.emit(&DispatchEvent::PositionUpdated(position));
            },
            None => {
                trace!("Ping reply did not match: {:?}", line);
                DispatcherMetrics::incr(&self.ctx.metrics.missed_pings, 1);
            },
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), DispatchError> {
        if let Some(discarded) = self.ctx.queue.clear_if_set(&self.ctx.cancel) {
            DispatcherMetrics::incr(&self.ctx.metrics.commands_discarded, discarded as u64);
            self.held = None;
            info!("Stop requested, discarded {} queued commands", discarded);
            return Ok(());
        }

        let motion = self.ctx.motion();
        let moving = motion.is_moving(self.config.movement_epsilon);
        let gate = self
            .ctx
            .queue
            .pop_if(|head, epoch| head.instant || !moving || self.settle_timed_out(epoch));

        let mut command = match gate {
            Gate::Empty => {
                self.held = None;
                return Ok(());
            },
            Gate::Held(epoch) => {
                if !matches!(self.held, Some((held, _)) if held == epoch) {
                    self.held = Some((epoch, Instant::now()));
                }
                DispatcherMetrics::incr(&self.ctx.metrics.gate_holds, 1);
                trace!("Still moving (delta {:.6}), holding queue head", motion.delta);
                return Ok(());
            },
            Gate::Released(command) => command,
        };

        if moving && !command.instant {
            warn!(
                "Machine still reports movement after {:?}, releasing {:?}",
                self.config.settle_timeout(),
                command.text
            );
            DispatcherMetrics::incr(&self.ctx.metrics.gate_timeouts, 1);
        }
        self.held = None;

        self.ctx.set_state(DispatcherState::Draining);
        let result = self.send(&mut command);
        self.ctx.set_state(DispatcherState::Polling);
        result
    }

    fn send(&mut self, command: &mut Command) -> Result<(), DispatchError> {
        command.stamp(self.ctx.motion().position);
        self.transport.write(&command.wire_bytes())?;
        DispatcherMetrics::incr(&self.ctx.metrics.commands_sent, 1);
        debug!("Dispatched {}", command);
        self.ctx
            .emit(&DispatchEvent::CommandDispatched(command.clone()));

        if command.response {
            match self.transport.read_line_text() {
                Ok(reply) => {
                    DispatcherMetrics::incr(&self.ctx.metrics.responses, 1);
                    self.ctx.emit(&DispatchEvent::ResponseReceived(reply));
                },
                Err(TransportError::Timeout) => {
                    warn!("No reply to {:?} before timeout", command.text);
                },
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn settle_timed_out(&self, epoch: u64) -> bool {
        match (self.config.settle_timeout(), self.held) {
            (Some(limit), Some((held, since))) if held == epoch => since.elapsed() >= limit,
            _ => false,
        }
    }
}

/// 调度线程主循环
///
/// 以固定间隔调用 [`DispatchLoop::poll_once`]，直到 `is_running` 被清除或传输层故障。
/// 故障时记录错误、发出 [`DispatchEvent::Failed`] 并清除 `is_running`，不做重试：
/// 由会话层重建调度器。
pub fn dispatch_loop<T: Transport>(mut dispatch: DispatchLoop<T>, is_running: Arc<AtomicBool>) {
    let interval = dispatch.config.poll_interval();
    let ctx = dispatch.ctx.clone();
    debug!("Dispatch loop started (poll interval {:?})", interval);

    while is_running.load(Ordering::Acquire) {
        if let Err(e) = dispatch.poll_once() {
            error!("Dispatch loop stopped on transport failure: {}", e);
            ctx.record_failure(e.to_string());
            is_running.store(false, Ordering::Release);
            break;
        }
        spin_sleep::sleep(interval);
    }

    ctx.set_state(DispatcherState::Stopped);
    debug!("Dispatch loop exited");
}
