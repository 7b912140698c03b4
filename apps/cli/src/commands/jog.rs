//! 点动命令
//!
//! 连接时会话已把当前位置设为原点，点动位移相对于连接时的位置。

use anyhow::Result;
use clap::Args;
use scanrig_sdk::protocol::Axis;

use crate::connection::ConnectArgs;
use crate::monitor::{self, FollowMode};

/// 点动命令参数
#[derive(Args, Debug)]
pub struct JogCommand {
    /// 轴
    #[arg(short, long)]
    pub axis: Axis,

    /// 相对位移（可为负）
    #[arg(short, long, allow_hyphen_values = true)]
    pub delta: f64,
}

impl JogCommand {
    pub async fn execute(&self, connect: &ConnectArgs) -> Result<()> {
        let (mut session, _config) = connect.open()?;

        println!("↔️  {} 轴点动 {}", self.axis, self.delta);
        session.jog(self.axis, self.delta)?;

        let (outcome, progress) = monitor::follow(&mut session, FollowMode::UntilIdle).await?;
        monitor::report(&outcome, &progress)
    }
}

