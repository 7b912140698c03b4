//! 位置查询回复解析

use crate::ProtocolError;
use crate::types::{Axis, Position};
use regex::Regex;

/// `info` 回复解析器
///
/// 正则的第 N 个捕获组对应 `order[N-1]` 轴；未出现在 `order` 中的轴取 0。
/// 回复不匹配时返回 `None`（视为本轮未更新，而不是错误）。
#[derive(Debug, Clone)]
pub struct InfoParser {
    regex: Regex,
    order: Vec<Axis>,
}

impl InfoParser {
    pub fn new(pattern: &str, order: &[Axis]) -> Result<Self, ProtocolError> {
        let regex = Regex::new(pattern)?;

        if order.is_empty() {
            return Err(ProtocolError::InvalidInfoOrder(
                "order must name at least one axis".to_string(),
            ));
        }
        let groups = regex.captures_len() - 1;
        if order.len() > groups {
            return Err(ProtocolError::InvalidInfoOrder(format!(
                "order names {} axes but regex has {} capture groups",
                order.len(),
                groups
            )));
        }
        for (i, axis) in order.iter().enumerate() {
            if order[..i].contains(axis) {
                return Err(ProtocolError::InvalidInfoOrder(format!(
                    "axis {axis} appears more than once"
                )));
            }
        }

        Ok(Self {
            regex,
            order: order.to_vec(),
        })
    }

    /// 解析一行回复
    pub fn parse(&self, line: &str) -> Option<Position> {
        let caps = self.regex.captures(line)?;
        let mut position = Position::ORIGIN;
        for (i, axis) in self.order.iter().enumerate() {
            let value: f64 = caps.get(i + 1)?.as_str().trim().parse().ok()?;
            position.set(*axis, value);
        }
        Some(position)
    }

    pub fn order(&self) -> &[Axis] {
        &self.order
    }
}
