//! 定时扫描
//!
//! 后台线程按固定间隔把同一组往返扫描命令重新入队，直到被停止。
//! 上一轮命令还没发完时跳过本次触发，队列不会无限堆积。

use crate::SessionError;
use crossbeam_channel::{Sender, bounded, select, tick};
use scanrig_driver::DispatchHandle;
use scanrig_protocol::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 定时扫描线程
pub struct ScanScheduler {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
    runs: Arc<AtomicU64>,
    interval: Duration,
}

impl ScanScheduler {
    /// 启动定时扫描（立即执行第一轮）
    pub fn start(
        dispatcher: DispatchHandle,
        commands: Vec<Command>,
        interval: Duration,
    ) -> Result<Self, SessionError> {
        if interval.is_zero() {
            return Err(SessionError::Config(
                "periodic scan interval must be positive".into(),
            ));
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let runs = Arc::new(AtomicU64::new(0));
        let counter = runs.clone();

        let thread = std::thread::Builder::new()
            .name("scanrig-scheduler".to_string())
            .spawn(move || {
                let ticker = tick(interval);
                let run = |dispatcher: &DispatchHandle| -> bool {
                    if dispatcher.queue_len() > 0 {
                        debug!("Previous sweep still queued, skipping this round");
                        return true;
                    }
                    match dispatcher.enqueue(commands.iter().cloned()) {
                        Ok(n) => {
                            let round = counter.fetch_add(1, Ordering::Relaxed) + 1;
                            info!("Periodic scan round {} queued ({} commands)", round, n);
                            true
                        },
                        Err(e) => {
                            warn!("Periodic scan stopped: {}", e);
                            false
                        },
                    }
                };

                if !run(&dispatcher) {
                    return;
                }
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if !run(&dispatcher) {
                                break;
                            }
                        },
                    }
                }
                debug!("Periodic scan scheduler exited");
            })
            .map_err(SessionError::Io)?;

        Ok(Self {
            stop_tx,
            thread: Some(thread),
            runs,
            interval,
        })
    }

    /// 已入队的轮数
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// 停止并等待线程退出
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("Periodic scan scheduler panicked");
        }
    }
}

impl Drop for ScanScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
