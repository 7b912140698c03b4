//! 位置查询命令
//!
//! 入队一条需要回复的位置查询指令，打印原始回复与解析后的位置。

use anyhow::{Context, Result, anyhow};
use scanrig_sdk::DispatchEvent;
use std::time::{Duration, Instant};
use tokio::task::spawn_blocking;

use crate::connection::ConnectArgs;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn execute(connect: &ConnectArgs) -> Result<()> {
    let (session, _config) = connect.open()?;
    let events = session.subscribe()?;
    session.query_info()?;

    let reply = spawn_blocking(move || {
        let deadline = Instant::now() + REPLY_TIMEOUT;
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match events.recv_timeout(remaining) {
                Ok(DispatchEvent::ResponseReceived(reply)) => return Some(reply),
                Ok(DispatchEvent::Failed(reason)) => {
                    eprintln!("❌ 调度器故障: {}", reason);
                    return None;
                },
                Ok(_) => {},
                Err(_) => return None,
            }
        }
        None
    })
    .await
    .map_err(|e| anyhow!("等待回复失败: {}", e))?
    .context("未收到设备回复")?;

    println!("📨 {}", reply);
    let parser = session.profile().info_parser()?;
    match parser.parse(&reply) {
        Some(position) => println!("📍 位置: {}", position),
        None => println!("📍 最后位置: {}", session.dispatcher()?.last_position()),
    }
    Ok(())
}
