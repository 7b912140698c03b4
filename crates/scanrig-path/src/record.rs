//! 路径持久化
//!
//! 文件格式是 JSON 数组，每个元素一条 [`WaypointRecord`]，按路径顺序排列，
//! 第一条总是原点。速度不落盘：加载时由目标路径重新写入。

use crate::path::Path;
use crate::PathError;
use scanrig_protocol::{Action, Waypoint};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path as FsPath;
use tracing::debug;

/// 航点持久化记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaypointRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub action: Action,
}

impl From<&Waypoint> for WaypointRecord {
    fn from(wp: &Waypoint) -> Self {
        Self {
            x: wp.x,
            y: wp.y,
            z: wp.z,
            action: wp.action,
        }
    }
}

/// 写入 JSON 文件
pub fn save_records(file: &FsPath, records: &[WaypointRecord]) -> Result<(), PathError> {
    let json = serde_json::to_string_pretty(records)?;
    fs::write(file, json)?;
    debug!("Saved {} waypoint records to {}", records.len(), file.display());
    Ok(())
}

/// 读取 JSON 文件
pub fn load_records(file: &FsPath) -> Result<Vec<WaypointRecord>, PathError> {
    let text = fs::read_to_string(file)?;
    let records: Vec<WaypointRecord> = serde_json::from_str(&text)?;
    debug!("Loaded {} waypoint records from {}", records.len(), file.display());
    Ok(records)
}

impl Path {
    /// 导出全部航点（含原点）
    pub fn records(&self) -> Vec<WaypointRecord> {
        self.iter().map(|(_, wp)| WaypointRecord::from(wp)).collect()
    }

    /// 按顺序追加记录（全部追加在尾部之后）
    pub fn extend_from_records(&mut self, records: &[WaypointRecord]) {
        for record in records {
            self.append(record.x, record.y, Some(record.z), Some(record.action));
        }
    }

    /// 从持久化记录重建路径
    ///
    /// 第一条记录对应原点，不会被重新创建。
    pub fn from_records(grid_step: f64, speed: f64, records: &[WaypointRecord]) -> Self {
        let mut path = Path::new(grid_step, speed);
        path.extend_from_records(records.get(1..).unwrap_or_default());
        path
    }

    /// 保存到文件
    pub fn save(&self, file: &FsPath) -> Result<(), PathError> {
        save_records(file, &self.records())
    }

    /// 用文件内容替换当前路径（网格间距与速度保持不变）
    pub fn load(&mut self, file: &FsPath) -> Result<(), PathError> {
        let records = load_records(file)?;
        self.clear();
        self.extend_from_records(records.get(1..).unwrap_or_default());
        Ok(())
    }
}
