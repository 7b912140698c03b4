//! 急停命令
//!
//! 连接设备，清空队列并立即发送机器配置中的停止指令。

use anyhow::{Result, bail};
use std::time::{Duration, Instant};

use crate::connection::ConnectArgs;

/// 等待停止指令发出的最长时间
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn execute(connect: &ConnectArgs) -> Result<()> {
    let (mut session, _config) = connect.open()?;

    println!("🛑 发送急停指令...");
    session.emergency_stop()?;

    let deadline = Instant::now() + STOP_TIMEOUT;
    loop {
        let dispatcher = session.dispatcher()?;
        if !dispatcher.is_running() {
            bail!(
                "调度器故障: {}",
                dispatcher.last_error().unwrap_or_else(|| "unknown".to_string())
            );
        }
        if dispatcher.queue_len() == 0 {
            break;
        }
        if Instant::now() >= deadline {
            bail!("急停指令未能在 {:?} 内发出", STOP_TIMEOUT);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    println!("✅ 急停完成");
    Ok(())
}
