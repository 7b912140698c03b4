//! 基础值类型
//!
//! 轴、轴组合与三维位置。

use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 单个运动轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// 所有轴（固定顺序 x, y, z）
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// 模板占位符名称（`{x}` / `{y}` / `{z}`）
    pub fn key(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Axis::X => 0b001,
            Axis::Y => 0b010,
            Axis::Z => 0b100,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Axis {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            other => Err(ProtocolError::InvalidAxis(other.to_string())),
        }
    }
}

/// 轴组合（用于选择 `absolute` / `relative` 模板）
///
/// 模板表以轴组合的小写键索引，例如 `x`、`xy`、`xyz`。
/// 键的字母顺序始终为 x → y → z。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisSet(u8);

impl AxisSet {
    pub const X: AxisSet = AxisSet(0b001);
    pub const Y: AxisSet = AxisSet(0b010);
    pub const Z: AxisSet = AxisSet(0b100);
    pub const XY: AxisSet = AxisSet(0b011);
    pub const XZ: AxisSet = AxisSet(0b101);
    pub const YZ: AxisSet = AxisSet(0b110);
    pub const XYZ: AxisSet = AxisSet(0b111);

    /// 由轴迭代器构造（重复的轴会被合并）
    pub fn from_axes(axes: impl IntoIterator<Item = Axis>) -> Self {
        AxisSet(axes.into_iter().fold(0, |acc, axis| acc | axis.bit()))
    }

    pub fn contains(self, axis: Axis) -> bool {
        self.0 & axis.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// 按 x, y, z 顺序迭代包含的轴
    pub fn axes(self) -> impl Iterator<Item = Axis> {
        Axis::ALL.into_iter().filter(move |axis| self.contains(*axis))
    }

    /// 模板表键（如 `"xy"`）
    pub fn key(self) -> String {
        self.axes().map(Axis::key).collect()
    }
}

impl From<Axis> for AxisSet {
    fn from(axis: Axis) -> Self {
        AxisSet(axis.bit())
    }
}

impl fmt::Display for AxisSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for AxisSet {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let axes = s
            .trim()
            .chars()
            .map(|c| c.to_string().parse::<Axis>())
            .collect::<Result<Vec<_>, _>>()?;
        let set = AxisSet::from_axes(axes);
        if set.is_empty() {
            return Err(ProtocolError::InvalidAxis(s.to_string()));
        }
        Ok(set)
    }
}

/// 设备坐标系下的三维位置
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const ORIGIN: Position = Position {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn set(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
    }

    /// 各轴位移平方和（"运动能量"）
    pub fn squared_distance(&self, other: &Position) -> f64 {
        Axis::ALL
            .iter()
            .map(|axis| {
                let d = self.get(*axis) - other.get(*axis);
                d * d
            })
            .sum()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_set_key_order() {
        let set = AxisSet::from_axes([Axis::Z, Axis::X]);
        assert_eq!(set, AxisSet::XZ);
        assert_eq!(set.key(), "xz");
        assert_eq!(AxisSet::XYZ.key(), "xyz");
        assert_eq!(AxisSet::from(Axis::Y).key(), "y");
    }

    #[test]
    fn test_axis_set_parse() {
        assert_eq!("yx".parse::<AxisSet>().unwrap(), AxisSet::XY);
        assert_eq!("XYZ".parse::<AxisSet>().unwrap(), AxisSet::XYZ);
        assert!("".parse::<AxisSet>().is_err());
        assert!("xw".parse::<AxisSet>().is_err());
    }

    #[test]
    fn test_squared_distance() {
        let a = Position::new(1.0, 2.0, 3.0);
        let b = Position::new(4.0, 6.0, 3.0);
        assert_eq!(a.squared_distance(&b), 25.0);
        assert_eq!(a.squared_distance(&a), 0.0);
    }
}
