//! 调度进度跟踪
//!
//! 事件接收是阻塞调用，放在 `spawn_blocking` 的专用线程中执行；
//! 主任务同时等待 Ctrl-C，收到后停止扫描并急停。

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use scanrig_sdk::driver::DispatchHandle;
use scanrig_sdk::protocol::Position;
use scanrig_sdk::{DispatchEvent, Session};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::spawn_blocking;
use tracing::debug;

/// 最后一条命令之后连续相同的位置回复次数，达到即视为机器已停稳
pub const SETTLE_PINGS: usize = 3;

const RECV_TIMEOUT: Duration = Duration::from_millis(200);

/// 跟踪方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowMode {
    /// 队列清空且机器停稳后返回
    UntilIdle,
    /// 一直跟踪，直到 Ctrl-C 或调度器故障
    Forever,
}

/// 跟踪结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed,
    Interrupted,
    Failed(String),
}

/// 根据事件流判断扫描进度
#[derive(Debug, Default)]
pub struct ScanProgress {
    pub dispatched: usize,
    pub actions: usize,
    last_position: Option<Position>,
    stable_pings: usize,
    failure: Option<String>,
}

impl ScanProgress {
    pub fn observe(&mut self, event: &DispatchEvent) {
        match event {
            DispatchEvent::PositionUpdated(position) => {
                if self.last_position == Some(*position) {
                    self.stable_pings += 1;
                } else {
                    self.stable_pings = 0;
                }
                self.last_position = Some(*position);
            },
            DispatchEvent::CommandDispatched(command) => {
                self.dispatched += 1;
                if command.action.is_some() {
                    self.actions += 1;
                }
                self.stable_pings = 0;
            },
            DispatchEvent::ResponseReceived(_) => {},
            DispatchEvent::Failed(reason) => self.failure = Some(reason.clone()),
        }
    }

    /// 最后一条命令发出后，机器是否已停稳
    pub fn is_settled(&self) -> bool {
        self.stable_pings >= SETTLE_PINGS
    }

    pub fn last_position(&self) -> Option<Position> {
        self.last_position
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

fn print_event(event: &DispatchEvent) {
    match event {
        DispatchEvent::PositionUpdated(position) => debug!("Position {}", position),
        DispatchEvent::CommandDispatched(command) => {
            println!("➡️  {}", command.text);
            if let Some(action) = command.action {
                println!("📸 动作: {}", action);
            }
        },
        DispatchEvent::ResponseReceived(reply) => println!("📨 {}", reply),
        DispatchEvent::Failed(reason) => eprintln!("❌ 调度器故障: {}", reason),
    }
}

/// 阻塞跟踪事件（在专用线程中运行）
fn watch_events(
    events: Receiver<DispatchEvent>,
    handle: DispatchHandle,
    mode: FollowMode,
    interrupted: Arc<AtomicBool>,
) -> (Outcome, ScanProgress) {
    let mut progress = ScanProgress::default();
    loop {
        if interrupted.load(Ordering::Acquire) {
            return (Outcome::Interrupted, progress);
        }

        match events.recv_timeout(RECV_TIMEOUT) {
            Ok(event) => {
                print_event(&event);
                progress.observe(&event);
            },
            Err(RecvTimeoutError::Timeout) => {},
            Err(RecvTimeoutError::Disconnected) => {
                return (Outcome::Failed("事件通道已关闭".to_string()), progress);
            },
        }

        if !handle.is_running() {
            let reason = progress.failure().unwrap_or("调度器已停止").to_string();
            return (Outcome::Failed(reason), progress);
        }
        if mode == FollowMode::UntilIdle && handle.queue_len() == 0 && progress.is_settled() {
            return (Outcome::Completed, progress);
        }
    }
}

/// 跟踪调度进度；Ctrl-C 时停止扫描并急停
pub async fn follow(session: &mut Session, mode: FollowMode) -> Result<(Outcome, ScanProgress)> {
    let events = session.subscribe()?;
    let handle = session.dispatcher()?.handle();
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();

    let mut task = spawn_blocking(move || watch_events(events, handle, mode, flag));

    tokio::select! {
        result = &mut task => {
            result.map_err(|e| anyhow!("事件跟踪任务失败: {}", e))
        }
        Ok(()) = tokio::signal::ctrl_c() => {
            println!();
            println!("🛑 收到 Ctrl-C，执行急停...");
            interrupted.store(true, Ordering::Release);
            session.stop_scanning();
            session.emergency_stop()?;
            let (_, progress) = task
                .await
                .map_err(|e| anyhow!("事件跟踪任务失败: {}", e))?;
            Ok((Outcome::Interrupted, progress))
        }
    }
}

/// 打印跟踪结果；故障时返回错误
pub fn report(outcome: &Outcome, progress: &ScanProgress) -> Result<()> {
    println!();
    println!("📊 已发送 {} 条命令，触发 {} 个动作", progress.dispatched, progress.actions);
    if let Some(position) = progress.last_position() {
        println!("   最后位置: {}", position);
    }
    match outcome {
        Outcome::Completed => {
            println!("✅ 完成");
            Ok(())
        },
        Outcome::Interrupted => {
            println!("⚠️ 已被用户中断");
            Ok(())
        },
        Outcome::Failed(reason) => Err(anyhow!("调度器故障: {}", reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanrig_sdk::{Action, Command};

    fn ping(x: f64) -> DispatchEvent {
        DispatchEvent::PositionUpdated(Position::new(x, 0.0, 0.0))
    }

    #[test]
    fn test_settles_after_repeated_positions() {
        let mut progress = ScanProgress::default();
        progress.observe(&DispatchEvent::CommandDispatched(Command::new("G0 X10")));
        progress.observe(&ping(0.0));
        progress.observe(&ping(5.0));
        progress.observe(&ping(10.0));
        assert!(!progress.is_settled());
        for _ in 0..SETTLE_PINGS {
            progress.observe(&ping(10.0));
        }
        assert!(progress.is_settled());
        assert_eq!(progress.last_position(), Some(Position::new(10.0, 0.0, 0.0)));
    }

    #[test]
    fn test_dispatch_resets_settle_count() {
        let mut progress = ScanProgress::default();
        for _ in 0..=SETTLE_PINGS {
            progress.observe(&ping(0.0));
        }
        assert!(progress.is_settled());
        progress.observe(&DispatchEvent::CommandDispatched(
            Command::new("G4 P1000").with_action(Action::CapturePhoto),
        ));
        assert!(!progress.is_settled());
        assert_eq!(progress.dispatched, 1);
        assert_eq!(progress.actions, 1);
    }

    #[test]
    fn test_failure_recorded() {
        let mut progress = ScanProgress::default();
        progress.observe(&DispatchEvent::Failed("Device disconnected".to_string()));
        assert_eq!(progress.failure(), Some("Device disconnected"));
        assert!(report(&Outcome::Failed("x".into()), &progress).is_err());
    }
}
