//! 路径编辑命令
//!
//! 离线编辑 JSON 路径文件。坐标按当前机器配置的网格间距吸附；
//! 航点以序号引用，0 为原点。

use anyhow::{Context, Result, bail};
use clap::{Subcommand, ValueEnum};
use scanrig_sdk::path::WaypointId;
use scanrig_sdk::{Action, Path, Session};
use std::path::{Path as FsPath, PathBuf};

use crate::connection::ConnectArgs;

/// 航点动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    None,
    Photo,
    StartRecording,
    StopRecording,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::None => Action::None,
            ActionArg::Photo => Action::CapturePhoto,
            ActionArg::StartRecording => Action::StartRecording,
            ActionArg::StopRecording => Action::StopRecording,
        }
    }
}

/// 路径命令
#[derive(Subcommand, Debug)]
pub enum PathCommand {
    /// 创建只含原点的路径文件
    New {
        file: PathBuf,
        /// 覆盖已有文件
        #[arg(long)]
        force: bool,
    },

    /// 添加航点（默认追加到末尾）
    Add {
        file: PathBuf,
        #[arg(short, long, allow_hyphen_values = true)]
        x: f64,
        #[arg(short, long, allow_hyphen_values = true)]
        y: f64,
        #[arg(short, long, allow_hyphen_values = true)]
        z: Option<f64>,
        #[arg(short, long, value_enum)]
        action: Option<ActionArg>,
        /// 插入到该序号的航点之后
        #[arg(long)]
        after: Option<usize>,
    },

    /// 移动航点（原点不可移动）
    Move {
        file: PathBuf,
        index: usize,
        #[arg(short, long, allow_hyphen_values = true)]
        x: f64,
        #[arg(short, long, allow_hyphen_values = true)]
        y: f64,
    },

    /// 设置航点动作
    Action {
        file: PathBuf,
        index: usize,
        #[arg(value_enum)]
        action: ActionArg,
    },

    /// 删除航点（原点不可删除）
    Remove { file: PathBuf, index: usize },

    /// 删除除原点外的所有航点
    Clear { file: PathBuf },

    /// 列出航点
    List { file: PathBuf },
}

impl PathCommand {
    pub async fn execute(self, connect: &ConnectArgs) -> Result<()> {
        let (mut session, _config) = connect.session()?;
        let file = self.file().to_path_buf();
        if !matches!(self, PathCommand::New { .. }) {
            load(&mut session, &file)?;
        }
        let path = session.path_mut();

        match self {
            PathCommand::New { force, .. } => {
                if file.exists() && !force {
                    bail!("路径文件已存在: {}（使用 --force 覆盖）", file.display());
                }
                println!("✅ 已创建 {}", file.display());
            },
            PathCommand::List { .. } => {
                print_path(path);
                return Ok(());
            },
            PathCommand::Add {
                x,
                y,
                z,
                action,
                after,
                ..
            } => {
                let action = action.map(Action::from);
                let id = match after {
                    Some(index) => path.insert_after(waypoint_at(path, index)?, x, y, z, action)?,
                    None => path.append(x, y, z, action),
                };
                if let Some(wp) = path.get(id) {
                    println!("➕ 航点 ({}, {}, {})", wp.x, wp.y, wp.z);
                }
            },
            PathCommand::Move { index, x, y, .. } => {
                let id = waypoint_at(path, index)?;
                path.move_to(id, x, y)?;
            },
            PathCommand::Action { index, action, .. } => {
                let id = waypoint_at(path, index)?;
                path.set_action(id, action.into())?;
            },
            PathCommand::Remove { index, .. } => {
                let id = waypoint_at(path, index)?;
                path.remove(id)?;
            },
            PathCommand::Clear { .. } => path.clear(),
        }

        session.save_path(&file)?;
        print_path(session.path());
        Ok(())
    }

    fn file(&self) -> &FsPath {
        match self {
            PathCommand::New { file, .. }
            | PathCommand::Add { file, .. }
            | PathCommand::Move { file, .. }
            | PathCommand::Action { file, .. }
            | PathCommand::Remove { file, .. }
            | PathCommand::Clear { file }
            | PathCommand::List { file } => file,
        }
    }
}

fn load(session: &mut Session, file: &FsPath) -> Result<()> {
    session
        .load_path(file)
        .with_context(|| format!("读取路径文件失败: {}", file.display()))?;
    Ok(())
}

fn waypoint_at(path: &Path, index: usize) -> Result<WaypointId> {
    path.iter()
        .nth(index)
        .map(|(id, _)| id)
        .with_context(|| format!("航点序号 {} 超出范围（共 {} 个）", index, path.len()))
}

fn print_path(path: &Path) {
    println!("📋 {} 个航点（网格 {}，速度 {}）", path.len(), path.grid_step(), path.speed());
    for (index, (_, wp)) in path.iter().enumerate() {
        let action = if wp.has_action() {
            format!("  [{}]", wp.action)
        } else {
            String::new()
        };
        println!("  {:>3}: ({}, {}, {}){}", index, wp.x, wp.y, wp.z, action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_edit_path_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(&config, "").unwrap();
        let connect = ConnectArgs {
            config: Some(config),
            ..Default::default()
        };
        let file = dir.path().join("path.json");

        PathCommand::New { file: file.clone(), force: false }
            .execute(&connect)
            .await
            .unwrap();
        PathCommand::Add {
            file: file.clone(),
            x: 120.0,
            y: 0.0,
            z: None,
            action: None,
            after: None,
        }
        .execute(&connect)
        .await
        .unwrap();
        PathCommand::Add {
            file: file.clone(),
            x: 60.0,
            y: 60.0,
            z: None,
            action: Some(ActionArg::Photo),
            after: Some(0),
        }
        .execute(&connect)
        .await
        .unwrap();

        let mut session = Session::new(scanrig_sdk::MachineProfile::gcode_default());
        session.load_path(&file).unwrap();
        let coords: Vec<(f64, f64, Action)> = session
            .path()
            .iter()
            .map(|(_, wp)| (wp.x, wp.y, wp.action))
            .collect();
        assert_eq!(
            coords,
            vec![
                (0.0, 0.0, Action::None),
                (50.0, 50.0, Action::CapturePhoto),
                (100.0, 0.0, Action::None),
            ]
        );

        // 原点不可删除；越界序号报错
        PathCommand::Remove { file: file.clone(), index: 0 }
            .execute(&connect)
            .await
            .unwrap();
        assert!(
            PathCommand::Remove { file: file.clone(), index: 9 }
                .execute(&connect)
                .await
                .is_err()
        );
        PathCommand::Clear { file: file.clone() }.execute(&connect).await.unwrap();
        session.load_path(&file).unwrap();
        assert_eq!(session.path().len(), 1);
    }
}
