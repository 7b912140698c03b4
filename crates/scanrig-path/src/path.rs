//! 双向链式航点序列
//!
//! # 存储
//!
//! 航点保存在 arena（`Vec<Slot>`）中，`prev` / `next` 是槽位下标而不是引用，
//! 插入和删除都是 O(1) 拼接，不产生所有权环。
//!
//! 对外暴露的 [`WaypointId`] 携带路径编号与槽位世代号：
//! 已删除航点的句柄、或来自另一条路径的句柄都会被识别为无效锚点。
//!
//! # 不变量（每次修改后检查）
//!
//! - 从 `head` 出发沿 `next` 恰好经过 `len` 个节点后到达 `tail`，无环
//! - `prev` 与 `next` 互为逆
//! - 只有 `head` 是原点标记（[`PointKind::Origin`]），且 `head.prev == None`
//! - `tail.next == None`

use crate::PathError;
use scanrig_protocol::{Action, MachineProfile, Waypoint};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::trace;

static NEXT_PATH_ID: AtomicU32 = AtomicU32::new(1);

/// 航点句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaypointId {
    path: u32,
    index: u32,
    generation: u32,
}

impl fmt::Display for WaypointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}@{}", self.index, self.generation, self.path)
    }
}

/// 航点类别
///
/// 原点标记是平台定义的零点：不可删除，`set_position` 对它是空操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    Origin,
    Path,
}

impl PointKind {
    pub fn is_movable(self) -> bool {
        self == PointKind::Path
    }
}

#[derive(Debug, Clone)]
struct Node {
    waypoint: Waypoint,
    kind: PointKind,
    prev: Option<u32>,
    next: Option<u32>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// 航点路径
#[derive(Debug, Clone)]
pub struct Path {
    id: u32,
    slots: Vec<Slot>,
    free: Vec<u32>,
    head: u32,
    tail: u32,
    len: usize,
    grid_step: f64,
    speed: f64,
}

impl Path {
    /// 创建只含原点的路径
    ///
    /// # 参数
    /// - `grid_step`: 网格间距（≤ 0 表示不吸附）
    /// - `speed`: 写入新航点的进给速度
    pub fn new(grid_step: f64, speed: f64) -> Self {
        let origin = Node {
            waypoint: Waypoint::new(0.0, 0.0, 0.0, Action::None, speed),
            kind: PointKind::Origin,
            prev: None,
            next: None,
        };
        Self {
            id: NEXT_PATH_ID.fetch_add(1, Ordering::Relaxed),
            slots: vec![Slot {
                generation: 0,
                node: Some(origin),
            }],
            free: Vec::new(),
            head: 0,
            tail: 0,
            len: 1,
            grid_step,
            speed,
        }
    }

    /// 按机器配置创建（网格间距、默认速度）
    pub fn for_profile(profile: &MachineProfile) -> Self {
        Self::new(profile.grid_step(), profile.default_speed)
    }

    pub fn grid_step(&self) -> f64 {
        self.grid_step
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// 航点总数（含原点）
    pub fn len(&self) -> usize {
        self.len
    }

    /// 除原点外没有任何航点
    pub fn is_empty(&self) -> bool {
        self.len == 1
    }

    pub fn head(&self) -> WaypointId {
        self.id_of(self.head)
    }

    pub fn tail(&self) -> WaypointId {
        self.id_of(self.tail)
    }

    pub fn contains(&self, id: WaypointId) -> bool {
        self.resolve(id).is_some()
    }

    pub fn get(&self, id: WaypointId) -> Option<&Waypoint> {
        self.node(id).map(|n| &n.waypoint)
    }

    pub fn kind(&self, id: WaypointId) -> Option<PointKind> {
        self.node(id).map(|n| n.kind)
    }

    pub fn next(&self, id: WaypointId) -> Option<WaypointId> {
        self.node(id)?.next.map(|i| self.id_of(i))
    }

    pub fn prev(&self, id: WaypointId) -> Option<WaypointId> {
        self.node(id)?.prev.map(|i| self.id_of(i))
    }

    /// 网格吸附
    ///
    /// 每个轴向下取整到网格：结果满足 `0 <= v - snap(v) < step`，负坐标同样适用。
    pub fn snap(&self, x: f64, y: f64) -> (f64, f64) {
        (snap_value(x, self.grid_step), snap_value(y, self.grid_step))
    }

    /// 在 `anchor` 之后插入航点
    ///
    /// `z` 缺省时继承 `anchor` 的 `z`；`anchor` 为尾节点时更新尾节点。
    pub fn insert_after(
        &mut self,
        anchor: WaypointId,
        x: f64,
        y: f64,
        z: Option<f64>,
        action: Option<Action>,
    ) -> Result<WaypointId, PathError> {
        let anchor_index = self.resolve(anchor).ok_or(PathError::InvalidAnchor(anchor))?;
        Ok(self.splice_after(anchor_index, x, y, z, action))
    }

    /// 追加到尾部（等价于 `insert_after(tail, …)`）
    pub fn append(&mut self, x: f64, y: f64, z: Option<f64>, action: Option<Action>) -> WaypointId {
        self.splice_after(self.tail, x, y, z, action)
    }

    /// 在已解析的槽位之后插入新节点，尾节点随之更新
    fn splice_after(
        &mut self,
        anchor_index: u32,
        x: f64,
        y: f64,
        z: Option<f64>,
        action: Option<Action>,
    ) -> WaypointId {
        let (anchor_z, anchor_next) = self
            .slot_node(anchor_index)
            .map_or((0.0, None), |node| (node.waypoint.z, node.next));

        let (x, y) = self.snap(x, y);
        let node = Node {
            waypoint: Waypoint::new(
                x,
                y,
                z.unwrap_or(anchor_z),
                action.unwrap_or_default(),
                self.speed,
            ),
            kind: PointKind::Path,
            prev: Some(anchor_index),
            next: anchor_next,
        };
        let index = self.allocate(node);

        if let Some(anchor) = self.slot_node_mut(anchor_index) {
            anchor.next = Some(index);
        }
        match anchor_next.and_then(|next| self.slot_node_mut(next)) {
            Some(next) => next.prev = Some(index),
            None => self.tail = index,
        }
        self.len += 1;

        let id = self.id_of(index);
        trace!("inserted waypoint {id} ({x}, {y}) after slot {anchor_index}");
        self.check_invariants();
        id
    }

    /// 删除航点
    ///
    /// 原点上调用是空操作；删除尾节点时尾节点回退到前一个航点。
    pub fn remove(&mut self, id: WaypointId) -> Result<(), PathError> {
        let index = self.resolve(id).ok_or(PathError::InvalidAnchor(id))?;
        if index == self.head {
            return Ok(());
        }

        let (prev, next) = {
            let node = self.node_at(index)?;
            (node.prev, node.next)
        };
        let prev = prev.ok_or_else(|| PathError::Corrupted(format!("{id} has no prev")))?;

        self.node_at_mut(prev)?.next = next;
        match next {
            Some(next) => self.node_at_mut(next)?.prev = Some(prev),
            None => self.tail = prev,
        }

        let slot = &mut self.slots[index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;

        trace!("removed waypoint {id}");
        self.check_invariants();
        Ok(())
    }

    /// 移动航点（坐标经过吸附，不改变链接）
    ///
    /// 原点标记不可移动，调用是空操作。
    pub fn move_to(&mut self, id: WaypointId, x: f64, y: f64) -> Result<(), PathError> {
        let (x, y) = self.snap(x, y);
        let node = self.node_mut(id)?;
        node.set_position(x, y);
        Ok(())
    }

    pub fn set_z(&mut self, id: WaypointId, z: f64) -> Result<(), PathError> {
        self.node_mut(id)?.waypoint.z = z;
        Ok(())
    }

    pub fn set_action(&mut self, id: WaypointId, action: Action) -> Result<(), PathError> {
        self.node_mut(id)?.waypoint.action = action;
        Ok(())
    }

    /// 清空为只含原点（原点属性保留）
    pub fn clear(&mut self) {
        let head = self.slots[self.head as usize].node.take();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if i as u32 != self.head && slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        if let Some(mut head) = head {
            head.next = None;
            self.slots[self.head as usize].node = Some(head);
        }
        self.free = (0..self.slots.len() as u32)
            .filter(|i| *i != self.head)
            .collect();
        self.tail = self.head;
        self.len = 1;
        self.check_invariants();
    }

    /// 从原点到尾部遍历
    pub fn iter(&self) -> impl Iterator<Item = (WaypointId, &Waypoint)> + '_ {
        let mut cursor = Some(self.head);
        let mut remaining = self.len;
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let index = cursor?;
            let node = self.slots.get(index as usize)?.node.as_ref()?;
            cursor = node.next;
            remaining -= 1;
            Some((self.id_of(index), &node.waypoint))
        })
    }

    /// 有序航点快照（含原点），用于编译与序列化
    pub fn to_sequence(&self) -> Vec<Waypoint> {
        self.iter().map(|(_, wp)| *wp).collect()
    }

    /// 校验链表不变量
    pub fn validate(&self) -> Result<(), PathError> {
        let corrupted = |msg: String| Err(PathError::Corrupted(msg));

        let head = match self.slots.get(self.head as usize).and_then(|s| s.node.as_ref()) {
            Some(node) => node,
            None => return corrupted("head slot is empty".to_string()),
        };
        if head.kind != PointKind::Origin || head.prev.is_some() {
            return corrupted("head is not a detached origin".to_string());
        }

        let mut visited = 0usize;
        let mut prev: Option<u32> = None;
        let mut cursor = Some(self.head);
        while let Some(index) = cursor {
            visited += 1;
            if visited > self.len {
                return corrupted(format!("cycle or overlong chain (len {})", self.len));
            }
            let node = match self.slots.get(index as usize).and_then(|s| s.node.as_ref()) {
                Some(node) => node,
                None => return corrupted(format!("dangling link to slot {index}")),
            };
            if node.prev != prev {
                return corrupted(format!("slot {index} prev link mismatch"));
            }
            if index != self.head && node.kind == PointKind::Origin {
                return corrupted(format!("slot {index} is a second origin"));
            }
            if node.next.is_none() && index != self.tail {
                return corrupted(format!("chain ends at {index}, tail is {}", self.tail));
            }
            prev = Some(index);
            cursor = node.next;
        }

        if visited != self.len {
            return corrupted(format!("visited {visited} nodes, len is {}", self.len));
        }
        Ok(())
    }

    #[inline]
    fn check_invariants(&self) {
        debug_assert!(
            self.validate().is_ok(),
            "path invariant violated: {:?}",
            self.validate()
        );
    }

    fn id_of(&self, index: u32) -> WaypointId {
        WaypointId {
            path: self.id,
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    fn resolve(&self, id: WaypointId) -> Option<u32> {
        if id.path != self.id {
            return None;
        }
        let slot = self.slots.get(id.index as usize)?;
        (slot.generation == id.generation && slot.node.is_some()).then_some(id.index)
    }

    fn node(&self, id: WaypointId) -> Option<&Node> {
        let index = self.resolve(id)?;
        self.slots[index as usize].node.as_ref()
    }

    fn node_mut(&mut self, id: WaypointId) -> Result<&mut Node, PathError> {
        let index = self.resolve(id).ok_or(PathError::InvalidAnchor(id))?;
        self.node_at_mut(index)
    }

    fn slot_node(&self, index: u32) -> Option<&Node> {
        self.slots.get(index as usize).and_then(|s| s.node.as_ref())
    }

    fn slot_node_mut(&mut self, index: u32) -> Option<&mut Node> {
        self.slots.get_mut(index as usize).and_then(|s| s.node.as_mut())
    }

    fn node_at(&self, index: u32) -> Result<&Node, PathError> {
        self.slots
            .get(index as usize)
            .and_then(|s| s.node.as_ref())
            .ok_or_else(|| PathError::Corrupted(format!("slot {index} is empty")))
    }

    fn node_at_mut(&mut self, index: u32) -> Result<&mut Node, PathError> {
        self.slots
            .get_mut(index as usize)
            .and_then(|s| s.node.as_mut())
            .ok_or_else(|| PathError::Corrupted(format!("slot {index} is empty")))
    }

    fn allocate(&mut self, node: Node) -> u32 {
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].node = Some(node);
                index
            },
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                (self.slots.len() - 1) as u32
            },
        }
    }
}

impl Node {
    /// 按类别处理位置更新：原点标记忽略
    fn set_position(&mut self, x: f64, y: f64) {
        if self.kind.is_movable() {
            self.waypoint.x = x;
            self.waypoint.y = y;
        }
    }
}

fn snap_value(value: f64, step: f64) -> f64 {
    if !(step > 0.0 && value.is_finite()) {
        return value;
    }
    // `%` 余数与被除数同号；负余数时再退一格
    let rem = value % step;
    let truncated = value - rem;
    if rem < 0.0 { truncated - step } else { truncated }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(path: &Path) -> Vec<(f64, f64)> {
        path.to_sequence().iter().map(|w| (w.x, w.y)).collect()
    }

    #[test]
    fn test_new_path_has_origin_only() {
        let path = Path::new(10.0, 1000.0);
        assert_eq!(path.len(), 1);
        assert!(path.is_empty());
        assert_eq!(path.head(), path.tail());
        assert_eq!(path.kind(path.head()), Some(PointKind::Origin));
        assert!(path.validate().is_ok());
    }

    #[test]
    fn test_snap_grid_50() {
        let mut path = Path::new(50.0, 1000.0);
        let id = path.append(123.0, 77.0, None, None);
        let wp = path.get(id).unwrap();
        assert_eq!((wp.x, wp.y), (100.0, 50.0));
    }

    #[test]
    fn test_snap_negative_rounds_down() {
        let path = Path::new(50.0, 1000.0);
        assert_eq!(path.snap(-20.0, 0.0), (-50.0, 0.0));
        assert_eq!(path.snap(-50.0, -120.0), (-50.0, -150.0));
        assert_eq!(path.snap(-0.5, 49.9), (-50.0, 0.0));
    }

    #[test]
    fn test_snap_without_grid() {
        let path = Path::new(0.0, 1000.0);
        assert_eq!(path.snap(12.3, 4.5), (12.3, 4.5));
    }

    #[test]
    fn test_insert_after_middle_and_tail() {
        let mut path = Path::new(1.0, 1000.0);
        let a = path.append(10.0, 0.0, None, None);
        let c = path.append(30.0, 0.0, None, None);
        let b = path.insert_after(a, 20.0, 0.0, None, None).unwrap();

        assert_eq!(coords(&path), vec![(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (30.0, 0.0)]);
        assert_eq!(path.next(a), Some(b));
        assert_eq!(path.prev(c), Some(b));
        assert_eq!(path.tail(), c);

        let d = path.insert_after(c, 40.0, 0.0, None, None).unwrap();
        assert_eq!(path.tail(), d);
        assert_eq!(path.next(d), None);
    }

    #[test]
    fn test_z_inherited_from_anchor() {
        let mut path = Path::new(1.0, 1000.0);
        let a = path.append(1.0, 1.0, Some(7.5), None);
        let b = path.append(2.0, 2.0, None, None);
        assert_eq!(path.get(b).unwrap().z, 7.5);
        let c = path.insert_after(a, 3.0, 3.0, None, Some(Action::CapturePhoto)).unwrap();
        assert_eq!(path.get(c).unwrap().z, 7.5);
        assert_eq!(path.get(c).unwrap().action, Action::CapturePhoto);
    }

    #[test]
    fn test_speed_stamped_on_waypoints() {
        let mut path = Path::new(1.0, 1234.0);
        let a = path.append(1.0, 1.0, None, None);
        assert_eq!(path.get(a).unwrap().speed, 1234.0);
        assert_eq!(path.get(path.head()).unwrap().speed, 1234.0);
    }

    #[test]
    fn test_remove_head_is_noop() {
        let mut path = Path::new(1.0, 1000.0);
        let a = path.append(5.0, 5.0, None, None);
        let before = coords(&path);
        path.remove(path.head()).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(coords(&path), before);
        assert_eq!(path.next(path.head()), Some(a));
    }

    #[test]
    fn test_remove_tail_updates_tail() {
        let mut path = Path::new(1.0, 1000.0);
        let a = path.append(5.0, 5.0, None, None);
        let b = path.append(6.0, 6.0, None, None);
        path.remove(b).unwrap();
        assert_eq!(path.tail(), a);
        assert_eq!(path.next(a), None);
        assert!(!path.contains(b));
    }

    #[test]
    fn test_remove_middle_relinks() {
        let mut path = Path::new(1.0, 1000.0);
        let a = path.append(1.0, 0.0, None, None);
        let b = path.append(2.0, 0.0, None, None);
        let c = path.append(3.0, 0.0, None, None);
        path.remove(b).unwrap();
        assert_eq!(path.next(a), Some(c));
        assert_eq!(path.prev(c), Some(a));
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn test_stale_id_is_invalid_anchor() {
        let mut path = Path::new(1.0, 1000.0);
        let a = path.append(1.0, 0.0, None, None);
        path.remove(a).unwrap();
        // 槽位被复用后，旧句柄依然无效
        let _b = path.append(2.0, 0.0, None, None);
        assert!(matches!(
            path.insert_after(a, 3.0, 0.0, None, None),
            Err(PathError::InvalidAnchor(_))
        ));
        assert!(matches!(path.remove(a), Err(PathError::InvalidAnchor(_))));
        assert!(matches!(path.move_to(a, 1.0, 1.0), Err(PathError::InvalidAnchor(_))));
    }

    #[test]
    fn test_foreign_id_is_invalid_anchor() {
        let mut path = Path::new(1.0, 1000.0);
        let other = Path::new(1.0, 1000.0);
        assert!(matches!(
            path.insert_after(other.head(), 1.0, 1.0, None, None),
            Err(PathError::InvalidAnchor(_))
        ));
    }

    #[test]
    fn test_move_to_snaps_and_keeps_links() {
        let mut path = Path::new(10.0, 1000.0);
        let a = path.append(10.0, 10.0, None, None);
        let b = path.append(20.0, 20.0, None, None);
        path.move_to(a, 47.0, 33.0).unwrap();
        let wp = path.get(a).unwrap();
        assert_eq!((wp.x, wp.y), (40.0, 30.0));
        assert_eq!(path.next(a), Some(b));
    }

    #[test]
    fn test_origin_is_not_movable() {
        let mut path = Path::new(10.0, 1000.0);
        path.move_to(path.head(), 100.0, 100.0).unwrap();
        let origin = path.get(path.head()).unwrap();
        assert_eq!((origin.x, origin.y), (0.0, 0.0));
    }

    #[test]
    fn test_clear_resets_to_origin() {
        let mut path = Path::new(1.0, 1000.0);
        let a = path.append(1.0, 0.0, None, None);
        path.append(2.0, 0.0, None, None);
        path.clear();
        assert_eq!(path.len(), 1);
        assert_eq!(path.tail(), path.head());
        assert!(!path.contains(a));
        let b = path.append(3.0, 0.0, None, None);
        assert_eq!(path.next(path.head()), Some(b));
    }

    #[test]
    fn test_append_matches_insert_after_tail() {
        let mut appended = Path::new(1.0, 1000.0);
        let mut inserted = Path::new(1.0, 1000.0);
        for (x, z) in [(1.0, Some(2.0)), (2.0, None), (3.0, Some(5.0))] {
            appended.append(x, 0.0, z, None);
            inserted
                .insert_after(inserted.tail(), x, 0.0, z, None)
                .unwrap();
        }
        assert_eq!(appended.to_sequence(), inserted.to_sequence());

        // 删除尾节点后追加，链接到新的尾节点
        appended.remove(appended.tail()).unwrap();
        let before = appended.tail();
        let c = appended.append(9.0, 0.0, None, None);
        assert_eq!(appended.prev(c), Some(before));
        assert_eq!(appended.tail(), c);
        assert_eq!(appended.get(c).unwrap().z, 2.0);
        appended.validate().unwrap();
    }
}
