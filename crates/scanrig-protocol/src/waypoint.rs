//! 航点值类型
//!
//! 路径模型内部以链表节点保存航点，对外（编译、持久化）只交换这个纯值类型。

use crate::action::Action;
use crate::types::Position;
use serde::{Deserialize, Serialize};

/// 航点快照
///
/// `x`、`y` 已经过网格吸附；`speed` 由所属路径在创建航点时写入。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub action: Action,
    pub speed: f64,
}

impl Waypoint {
    pub fn new(x: f64, y: f64, z: f64, action: Action, speed: f64) -> Self {
        Self {
            x,
            y,
            z,
            action,
            speed,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y, self.z)
    }

    pub fn has_action(&self) -> bool {
        !self.action.is_none()
    }
}
