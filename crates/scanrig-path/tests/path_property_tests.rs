//! 路径模型属性测试
//!
//! 随机插入/删除/移动序列之后检查链表不变量。

use proptest::prelude::*;
use scanrig_path::{Path, PathError, PointKind, WaypointRecord, load_records, save_records};
use scanrig_protocol::Action;

#[derive(Debug, Clone)]
enum Op {
    Append(f64, f64),
    InsertAfter(usize, f64, f64),
    Remove(usize),
    Move(usize, f64, f64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let coord = 0.0f64..600.0;
    prop_oneof![
        (coord.clone(), coord.clone()).prop_map(|(x, y)| Op::Append(x, y)),
        (0usize..16, coord.clone(), coord.clone()).prop_map(|(i, x, y)| Op::InsertAfter(i, x, y)),
        (0usize..16).prop_map(Op::Remove),
        (0usize..16, coord.clone(), coord).prop_map(|(i, x, y)| Op::Move(i, x, y)),
    ]
}

fn nth_id(path: &Path, n: usize) -> scanrig_path::WaypointId {
    let ids: Vec<_> = path.iter().map(|(id, _)| id).collect();
    ids[n % ids.len()]
}

proptest! {
    #[test]
    fn prop_invariants_hold_after_mutations(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let mut path = Path::new(10.0, 1000.0);
        for op in ops {
            match op {
                Op::Append(x, y) => {
                    path.append(x, y, None, None);
                },
                Op::InsertAfter(n, x, y) => {
                    let anchor = nth_id(&path, n);
                    path.insert_after(anchor, x, y, None, None).unwrap();
                },
                Op::Remove(n) => {
                    let id = nth_id(&path, n);
                    path.remove(id).unwrap();
                },
                Op::Move(n, x, y) => {
                    let id = nth_id(&path, n);
                    path.move_to(id, x, y).unwrap();
                },
            }

            prop_assert!(path.validate().is_ok());
            prop_assert_eq!(path.iter().count(), path.len());
            prop_assert_eq!(path.next(path.tail()), None);
            prop_assert_eq!(path.prev(path.head()), None);

            let origins = path
                .iter()
                .filter(|(id, _)| path.kind(*id) == Some(PointKind::Origin))
                .count();
            prop_assert_eq!(origins, 1);

            let origin = path.get(path.head()).unwrap();
            prop_assert_eq!((origin.x, origin.y), (0.0, 0.0));
        }
    }

    #[test]
    fn prop_snap_is_idempotent_and_bounded(x in -10_000.0f64..10_000.0, y in -10_000.0f64..10_000.0, step in 1u32..200) {
        let step = f64::from(step);
        let path = Path::new(step, 1000.0);
        let (sx, sy) = path.snap(x, y);
        prop_assert!(x - sx >= 0.0 && x - sx < step);
        prop_assert!(y - sy >= 0.0 && y - sy < step);
        prop_assert_eq!(path.snap(sx, sy), (sx, sy));
    }

    #[test]
    fn prop_remove_head_is_noop(points in prop::collection::vec((0.0f64..500.0, 0.0f64..500.0), 0..10)) {
        let mut path = Path::new(5.0, 1000.0);
        for (x, y) in points {
            path.append(x, y, None, None);
        }
        let before = path.to_sequence();
        path.remove(path.head()).unwrap();
        prop_assert_eq!(path.to_sequence(), before);
    }
}

#[test]
fn test_grid_50_snaps_down_to_grid() {
    let mut path = Path::new(50.0, 1000.0);
    let id = path.append(123.0, 77.0, None, None);
    let wp = path.get(id).unwrap();
    assert_eq!((wp.x, wp.y), (100.0, 50.0));
}

#[test]
fn test_insert_after_removed_anchor_fails() {
    let mut path = Path::new(1.0, 1000.0);
    let a = path.append(1.0, 1.0, None, None);
    path.remove(a).unwrap();
    let err = path.insert_after(a, 2.0, 2.0, None, None).unwrap_err();
    assert!(matches!(err, PathError::InvalidAnchor(id) if id == a));
}

#[test]
fn test_save_and_load_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("path.json");

    let mut path = Path::new(10.0, 1500.0);
    path.append(100.0, 0.0, Some(1.0), None);
    path.append(100.0, 100.0, None, Some(Action::CapturePhoto));
    path.save(&file).unwrap();

    let records: Vec<WaypointRecord> = load_records(&file).unwrap();
    assert_eq!(records.len(), 3);

    let mut restored = Path::new(10.0, 1500.0);
    restored.append(5.0, 5.0, None, None);
    restored.load(&file).unwrap();
    assert_eq!(restored.to_sequence(), path.to_sequence());
}

#[test]
fn test_load_rejects_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("broken.json");
    std::fs::write(&file, "{ not json").unwrap();
    assert!(matches!(load_records(&file), Err(PathError::Format(_))));

    save_records(&file, &[]).unwrap();
    assert!(load_records(&file).unwrap().is_empty());
}

#[test]
fn test_negative_coordinates_snap_down() {
    let mut path = Path::new(50.0, 1000.0);
    let id = path.append(-20.0, -77.0, None, None);
    let wp = path.get(id).unwrap();
    assert_eq!((wp.x, wp.y), (-50.0, -100.0));
}
