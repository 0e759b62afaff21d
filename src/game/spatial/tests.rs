use super::*;
use crate::game::fixed_math::{FixedNum, FixedVec3};

fn fx(v: f32) -> FixedNum {
    FixedNum::from_num(v)
}

fn boxed(kind: ItemKind, x: f32, y: f32, size: f32) -> SpatialItem {
    SpatialItem::new(kind, FixedVec3::new(fx(x), fx(y), fx(0.0)), FixedVec3::new(fx(size), fx(size), fx(1.0)))
}

fn ground_unit(x: f32, y: f32, size: f32) -> SpatialItem {
    boxed(ItemKind::Unit(UnitState::new(0)), x, y, size)
}

#[test]
fn test_overlapped_cells_exclude_touching_edges() {
    // Edges at exactly 2.0 and 3.0 cover [2, 3) only.
    let item = ground_unit(2.5, 2.5, 1.0);
    let cells = overlapped_cells(&item, 10, 10);
    assert_eq!(cells.as_slice(), &[(2, 2)]);

    let straddling = ground_unit(3.0, 3.0, 1.0);
    assert_eq!(overlapped_cells(&straddling, 10, 10).as_slice(), &[(2, 2), (3, 2), (2, 3), (3, 3)]);

    let point = ground_unit(4.0, 4.0, 0.0);
    assert_eq!(overlapped_cells(&point, 10, 10).as_slice(), &[(4, 4)], "Zero-size boxes keep one cell");

    let small = ground_unit(2.4, 2.4, 0.5);
    assert_eq!(overlapped_cells(&small, 10, 10).as_slice(), &[(2, 2)]);
}

#[test]
fn test_overlapped_cells_clamped_to_map() {
    let off_map = ground_unit(-5.0, -5.0, 1.0);
    assert_eq!(overlapped_cells(&off_map, 4, 4).as_slice(), &[(0, 0)]);

    let past_edge = ground_unit(20.0, 1.5, 0.5);
    assert_eq!(overlapped_cells(&past_edge, 4, 4).as_slice(), &[(3, 1)]);

    let on_border = ground_unit(3.5, 3.5, 1.0);
    assert_eq!(overlapped_cells(&on_border, 4, 4).as_slice(), &[(3, 3)]);

    assert!(overlapped_cells(&ground_unit(1.0, 1.0, 1.0), 0, 0).is_empty());
}

#[test]
fn test_spawn_and_despawn_keep_cells_in_sync() {
    let mut index = SpatialIndex::new(8, 8);
    let id = index.spawn(ground_unit(2.5, 2.5, 1.0));

    assert_eq!(index.len(), 1);
    assert_eq!(index.grid().total_entries(), 1);
    assert!(index.grid().cell(2, 2).unwrap().contains(id));
    assert!(index.get(id).unwrap().is_in_cells());
    assert!(!index.get(id).unwrap().cells_dirty());

    let removed = index.despawn(id);
    assert!(removed.is_some());
    assert!(index.is_empty());
    assert_eq!(index.grid().total_entries(), 0, "No cell may refer to a despawned item");
    assert!(index.despawn(id).is_none());

    // Freed slots are reused.
    let again = index.spawn(ground_unit(1.5, 1.5, 0.5));
    assert_eq!(again, id);
}

#[test]
fn test_move_updates_membership() {
    let mut index = SpatialIndex::new(8, 8);
    let id = index.spawn(ground_unit(1.4, 1.4, 0.5));
    assert!(index.grid().cell(1, 1).unwrap().contains(id));

    assert!(index.move_by(id, FixedVec3::new(fx(3.0), fx(0.0), fx(0.0))));
    assert!(!index.grid().cell(1, 1).unwrap().contains(id));
    assert!(index.grid().cell(4, 1).unwrap().contains(id));
    assert_eq!(index.get(id).unwrap().cells(), &[(4, 1)]);

    assert!(index.move_to(id, FixedVec3::new(fx(6.4), fx(6.4), fx(0.0))));
    assert_eq!(index.grid().total_entries(), 1);
    assert!(index.grid().cell(6, 6).unwrap().contains(id));

    assert!(index.set_size(id, fx(2.0), fx(2.0), fx(1.0)));
    assert_eq!(index.get(id).unwrap().cells().len(), 9);
    assert_eq!(index.grid().total_entries(), 9);
}

#[test]
fn test_shots_never_occupy_cells() {
    let mut index = SpatialIndex::new(8, 8);
    let shot = index.spawn(boxed(ItemKind::Shot, 3.5, 3.5, 0.5));
    assert_eq!(index.grid().total_entries(), 0);
    assert!(!index.get(shot).unwrap().is_in_cells());

    assert!(index.move_by(shot, FixedVec3::new(fx(1.0), fx(0.0), fx(0.0))));
    assert_eq!(index.grid().total_entries(), 0);
    assert!(!index.cell_occupied(3, 3, None, true).unwrap());
}

#[test]
fn test_cell_occupied_rules() {
    let mut index = SpatialIndex::new(8, 8);
    let ground = index.spawn(ground_unit(2.5, 2.5, 0.5));
    let mut flying_state = UnitState::new(1).flying();
    flying_state.moving = true;
    let flyer = index.spawn(boxed(ItemKind::Unit(flying_state), 5.5, 5.5, 0.5));
    index.spawn(boxed(ItemKind::Item, 1.5, 5.5, 0.5));

    // Ground occupants only block ground units.
    assert!(index.cell_occupied(2, 2, None, false).unwrap());
    assert!(!index.cell_occupied(2, 2, Some(flyer), false).unwrap());
    assert!(!index.cell_occupied(2, 2, Some(ground), false).unwrap(), "An item never blocks itself");

    // Map items block ground units only.
    assert!(index.cell_occupied(1, 5, Some(ground), false).unwrap());
    assert!(!index.cell_occupied(1, 5, Some(flyer), false).unwrap());

    // Moving units only count when asked for.
    let other_flyer = index.spawn(boxed(ItemKind::Unit(UnitState::new(1).flying()), 0.5, 0.5, 0.5));
    assert!(!index.cell_occupied(5, 5, Some(other_flyer), false).unwrap());
    assert!(index.cell_occupied(5, 5, Some(other_flyer), true).unwrap());

    // Destroyed units never count.
    index.unit_mut(ground).unwrap().destroyed = true;
    assert!(!index.cell_occupied(2, 2, None, true).unwrap());

    assert!(index.cell_occupied(8, 0, None, true).is_err());
    assert!(index.cells_occupied((0, 0), (3, 5), None, false).unwrap());
}

#[test]
fn test_unit_filling_one_cell_leaves_neighbours_free() {
    let mut index = SpatialIndex::new(8, 8);
    let id = index.spawn(ground_unit(2.5, 2.5, 1.0));
    assert_eq!(index.get(id).unwrap().cells(), &[(2, 2)]);

    assert!(index.cell_occupied(2, 2, None, false).unwrap());
    for (x, y) in [(3, 2), (2, 3), (3, 3), (1, 1)] {
        assert!(!index.cell_occupied(x, y, None, false).unwrap(), "cell ({}, {}) should be free", x, y);
    }
}

#[test]
fn test_box_collision_basic_cases() {
    let mut index = SpatialIndex::new(16, 16);
    let a = index.spawn(ground_unit(4.0, 4.0, 4.0));
    let b = index.spawn(ground_unit(5.0, 5.0, 4.0));
    let far = index.spawn(ground_unit(12.0, 12.0, 2.0));

    assert!(index.items_collide(a, b));
    assert!(index.items_collide(b, a));
    assert!(!index.items_collide(a, far));
    assert!(!index.items_collide(far, a));

    // Same footprint, but above the item.
    let v1 = FixedVec3::new(fx(3.0), fx(3.0), fx(5.0));
    let v2 = FixedVec3::new(fx(5.0), fx(5.0), fx(6.0));
    assert!(!index.test_box_collision(a, v1, v2));
    let low = FixedVec3::new(fx(3.0), fx(3.0), fx(0.0));
    assert!(index.test_box_collision(a, low, FixedVec3::new(fx(5.0), fx(5.0), fx(1.0))));
}

#[test]
fn test_collision_uses_velocity() {
    let mut index = SpatialIndex::new(32, 32);
    let a = index.spawn(ground_unit(4.0, 4.0, 2.0));
    let b = index.spawn(ground_unit(10.0, 4.0, 2.0));
    assert!(!index.items_collide(a, b));

    index.get_mut(a).unwrap().velocity = FixedVec3::new(fx(6.0), fx(0.0), fx(0.0));
    assert!(index.items_collide(a, b));
}

#[test]
fn test_collisions_at_deduplicates() {
    let mut index = SpatialIndex::new(16, 16);
    let a = index.spawn(ground_unit(4.0, 4.0, 4.0));
    let b = index.spawn(ground_unit(5.0, 5.0, 4.0));
    let cells = index.get(a).unwrap().cells().to_vec();
    assert!(cells.len() > 1);

    let hits = index.collisions_at(a, &cells);
    assert_eq!(hits, vec![b]);
}

#[test]
fn test_visible_status_flags() {
    let mut status = VisibleStatus::UNKNOWN;
    assert!(!status.is_visible());
    status.insert(VisibleStatus::VISIBLE | VisibleStatus::EARLIER);
    assert!(status.is_visible());
    assert!(status.contains(VisibleStatus::EARLIER));
    status.remove(VisibleStatus::VISIBLE);
    assert_eq!(status, VisibleStatus::EARLIER);

    let mut unit = UnitState::new(0);
    assert_eq!(unit.visible_status(3), VisibleStatus::UNKNOWN);
    assert!(unit.set_visible_status(3, VisibleStatus::VISIBLE));
    assert!(!unit.set_visible_status(3, VisibleStatus::VISIBLE));
    assert_eq!(unit.visible_status(3), VisibleStatus::VISIBLE);
}
