//! run 命令
//!
//! 读取路径文件，编译后交给调度器执行，直到机器停稳。

use anyhow::{Context, Result};
use clap::Args;
use scanrig_sdk::protocol::AxisSet;
use std::path::PathBuf;

use crate::connection::ConnectArgs;
use crate::monitor::{self, FollowMode};

/// 路径执行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 路径文件（JSON 航点记录）
    #[arg(short, long)]
    pub path: PathBuf,

    /// 参与运动的轴，如 `xy`、`xyz`（覆盖配置 scan.path-axes）
    #[arg(short, long)]
    pub axes: Option<AxisSet>,

    /// 只打印编译后的指令，不连接设备
    #[arg(long)]
    pub dry_run: bool,
}

impl RunCommand {
    pub async fn execute(&self, connect: &ConnectArgs) -> Result<()> {
        let (mut session, config) = connect.session()?;
        let axes = match self.axes {
            Some(axes) => axes,
            None => config.scan.path_axes()?,
        };

        println!("📜 加载路径: {}", self.path.display());
        session
            .load_path(&self.path)
            .with_context(|| format!("读取路径文件失败: {}", self.path.display()))?;
        println!("📋 {} 个航点（含原点），轴 {}", session.path().len(), axes);

        if self.dry_run {
            let sequence = session.path().to_sequence();
            for command in session.compiler().compile_path(&sequence, axes)? {
                println!("  {}", command);
            }
            return Ok(());
        }

        if session.path().len() <= 1 {
            println!("⚠️ 路径只含原点，无需执行");
            return Ok(());
        }

        connect.connect(&mut session, &config)?;
        let queued = session.start_scan(axes)?;
        println!("▶️  已入队 {} 条命令（按 Ctrl-C 急停）", queued);

        let (outcome, progress) = monitor::follow(&mut session, FollowMode::UntilIdle).await?;
        monitor::report(&outcome, &progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanrig_sdk::path::{WaypointRecord, save_records};
    use scanrig_sdk::Action;

    #[tokio::test]
    async fn test_dry_run_does_not_connect() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("path.json");
        let records = [
            WaypointRecord { x: 0.0, y: 0.0, z: 0.0, action: Action::None },
            WaypointRecord { x: 100.0, y: 50.0, z: 0.0, action: Action::CapturePhoto },
        ];
        save_records(&file, &records).unwrap();

        let connect = ConnectArgs {
            config: Some(dir.path().join("missing.toml")),
            ..Default::default()
        };
        // 显式指定的配置文件不存在
        let cmd = RunCommand {
            path: file.clone(),
            axes: None,
            dry_run: true,
        };
        assert!(cmd.execute(&connect).await.is_err());

        std::fs::write(dir.path().join("missing.toml"), "").unwrap();
        cmd.execute(&connect).await.unwrap();
    }
}
