//! sweep 命令
//!
//! 沿单轴往返扫描：到 `distance` 再回到 0。
//! 间隔大于 0 时按固定间隔重复，直到 Ctrl-C。

use anyhow::{Result, bail};
use clap::Args;
use scanrig_sdk::protocol::Axis;
use std::time::Duration;

use crate::connection::ConnectArgs;
use crate::monitor::{self, FollowMode};

/// 往返扫描命令参数
#[derive(Args, Debug)]
pub struct SweepCommand {
    /// 行程（覆盖配置 scan.distance）
    #[arg(short, long, allow_hyphen_values = true)]
    pub distance: Option<f64>,

    /// 扫描轴（覆盖配置 scan.axis）
    #[arg(short, long)]
    pub axis: Option<Axis>,

    /// 重复间隔（秒，0 表示只扫描一次；覆盖配置 scan.interval-secs）
    #[arg(short, long)]
    pub interval_secs: Option<u64>,
}

impl SweepCommand {
    pub async fn execute(&self, connect: &ConnectArgs) -> Result<()> {
        let (mut session, config) = connect.session()?;
        let distance = self.distance.unwrap_or(config.scan.distance);
        let axis = self.axis.unwrap_or(config.scan.axis);
        let interval = self
            .interval_secs
            .map_or(config.scan.interval(), |secs| {
                (secs > 0).then(|| Duration::from_secs(secs))
            });
        if !distance.is_finite() {
            bail!("行程必须是有限值: {}", distance);
        }

        connect.connect(&mut session, &config)?;
        let mode = match interval {
            Some(interval) => {
                session.start_periodic_scan(axis, distance, interval)?;
                println!(
                    "🔁 每 {:?} 沿 {} 轴往返扫描 {}（按 Ctrl-C 停止）",
                    interval, axis, distance
                );
                FollowMode::Forever
            },
            None => {
                session.start_sweep(axis, distance)?;
                println!("▶️  沿 {} 轴往返扫描 {}（按 Ctrl-C 急停）", axis, distance);
                FollowMode::UntilIdle
            },
        };

        let (outcome, progress) = monitor::follow(&mut session, mode).await?;
        if let Some(scheduler) = session.periodic_scan() {
            println!("   定时扫描已执行 {} 轮", scheduler.runs());
        }
        monitor::report(&outcome, &progress)
    }
}
