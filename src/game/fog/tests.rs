use super::*;
use crate::game::error::LoadError;
use crate::game::fixed_math::{FixedNum, FixedVec3};
use crate::game::spatial::{SpatialItem, UnitState};

fn unit_at(index: &mut SpatialIndex, unit: UnitState, x: f32, y: f32) -> ItemId {
    let size = FixedVec3::new(FixedNum::from_num(0.5), FixedNum::from_num(0.5), FixedNum::from_num(1.0));
    index.spawn(SpatialItem::unit(unit, FixedVec3::from_f32(x, y, 0.0), size))
}

fn fog_map(player: PlayerId, width: u32, height: u32) -> PlayerFog {
    let mut fog = PlayerFog::new(player, true);
    fog.init_map(width, height, true, true);
    fog
}

#[test]
fn test_init_map_counts() {
    let mut hidden = PlayerFog::new(0, true);
    hidden.init_map(5, 5, true, true);
    assert_eq!(hidden.explored_count(), 0);
    assert_eq!(hidden.unfogged_count(), 0);

    let mut open = PlayerFog::new(1, true);
    open.init_map(5, 5, false, false);
    assert_eq!(open.explored_count(), 25);
    assert_eq!(open.unfogged_count(), 25);
    assert_eq!(open.fog_ref(4, 4).unwrap(), 1);

    // A second init is ignored.
    open.init_map(8, 8, true, true);
    assert_eq!(open.width(), 5);
    assert_eq!(open.explored_count(), 25);
}

#[test]
fn test_fog_ref_transitions() {
    let mut index = SpatialIndex::new(4, 4);
    let mut fog = fog_map(0, 4, 4);

    fog.add_fog_ref(1, 2, &mut index).unwrap();
    assert_eq!(
        fog.drain_events(),
        vec![FogEvent::Explored { player: 0, x: 1, y: 2 }, FogEvent::Unfogged { player: 0, x: 1, y: 2 }]
    );
    assert!(!fog.is_fogged(1, 2).unwrap());
    assert!(fog.is_explored(1, 2).unwrap());

    fog.add_fog_ref(1, 2, &mut index).unwrap();
    fog.remove_fog_ref(1, 2, &mut index).unwrap();
    assert!(fog.drain_events().is_empty(), "Only 0 <-> 1 transitions are reported");
    assert_eq!(fog.fog_ref(1, 2).unwrap(), 1);

    fog.remove_fog_ref(1, 2, &mut index).unwrap();
    assert_eq!(fog.drain_events(), vec![FogEvent::Fogged { player: 0, x: 1, y: 2 }]);
    assert!(fog.is_fogged(1, 2).unwrap());
    assert!(fog.is_explored(1, 2).unwrap(), "Fogging never unexplores");
    assert_eq!(fog.unfogged_count(), 0);
    assert_eq!(fog.explored_count(), 1);
}

#[test]
fn test_fog_ref_underflow_is_rejected() {
    let mut index = SpatialIndex::new(4, 4);
    let mut fog = fog_map(0, 4, 4);

    let result = fog.remove_fog_ref(0, 0, &mut index);
    assert_eq!(result, Err(FogError::RefCountUnderflow { x: 0, y: 0 }));
    assert_eq!(fog.fog_ref(0, 0).unwrap(), 0);
    assert_eq!(fog.unfogged_count(), 0);
    assert!(fog.drain_events().is_empty());

    assert!(matches!(fog.add_fog_ref(4, 0, &mut index), Err(FogError::Grid(_))));
}

#[test]
fn test_explore_and_unexplore() {
    let mut fog = fog_map(2, 3, 3);
    fog.explore(0, 0).unwrap();
    fog.explore(0, 0).unwrap();
    assert_eq!(fog.explored_count(), 1);
    fog.unexplore(0, 0).unwrap();
    fog.unexplore(0, 0).unwrap();
    assert_eq!(fog.explored_count(), 0);
    assert_eq!(
        fog.drain_events(),
        vec![FogEvent::Explored { player: 2, x: 0, y: 0 }, FogEvent::Unexplored { player: 2, x: 0, y: 0 }]
    );
    assert!(fog.explore(-1, 0).is_err());
}

#[test]
fn test_enemy_unit_visibility_follows_fog() {
    let mut index = SpatialIndex::new(6, 6);
    let mut fog = fog_map(0, 6, 6);
    let enemy = unit_at(&mut index, UnitState::new(1), 2.5, 2.5);

    fog.add_fog_ref(2, 2, &mut index).unwrap();
    assert!(fog.can_see(&index, enemy));
    assert_eq!(index.unit(enemy).unwrap().visible_status(0), VisibleStatus::VISIBLE);
    assert!(fog.drain_events().contains(&FogEvent::UnitVisibilityChanged {
        player: 0,
        unit: enemy,
        status: VisibleStatus::VISIBLE,
    }));

    fog.remove_fog_ref(2, 2, &mut index).unwrap();
    assert!(!fog.can_see(&index, enemy));
    assert_eq!(index.unit(enemy).unwrap().visible_status(0), VisibleStatus::UNKNOWN);
}

#[test]
fn test_facility_keeps_ghost_after_fogging() {
    let mut index = SpatialIndex::new(6, 6);
    let mut fog = fog_map(0, 6, 6);
    let facility = unit_at(&mut index, UnitState::new(1).facility(), 3.5, 1.5);

    fog.add_fog_ref(3, 1, &mut index).unwrap();
    assert_eq!(
        index.unit(facility).unwrap().visible_status(0),
        VisibleStatus::VISIBLE | VisibleStatus::EARLIER
    );

    fog.remove_fog_ref(3, 1, &mut index).unwrap();
    assert_eq!(index.unit(facility).unwrap().visible_status(0), VisibleStatus::EARLIER);
}

#[test]
fn test_inactive_players_and_owners_are_skipped() {
    let mut index = SpatialIndex::new(6, 6);
    let mut observer = PlayerFog::new(0, false);
    observer.init_map(6, 6, true, true);
    let mut owner = fog_map(1, 6, 6);
    let unit = unit_at(&mut index, UnitState::new(1), 2.5, 2.5);

    observer.add_fog_ref(2, 2, &mut index).unwrap();
    assert_eq!(index.unit(unit).unwrap().visible_status(0), VisibleStatus::UNKNOWN);
    assert!(observer.can_see(&index, unit), "Inactive players still track fog");

    owner.add_fog_ref(2, 2, &mut index).unwrap();
    assert_eq!(index.unit(unit).unwrap().visible_status(1), VisibleStatus::UNKNOWN);
}

#[test]
fn test_sight_circle_shape() {
    let cells = sight_circle(5, 5, 2, 10, 10);
    assert_eq!(cells.len(), 9);
    assert!(cells.contains(&(4, 4)));
    assert!(cells.contains(&(6, 6)));
    assert!(!cells.contains(&(3, 5)), "Cells at exactly the range are outside");

    let corner = sight_circle(0, 0, 2, 10, 10);
    assert_eq!(corner, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);

    assert!(sight_circle(3, 3, 0, 10, 10).is_empty());
}

#[test]
fn test_sight_manager_moves_refs_with_unit() {
    let mut index = SpatialIndex::new(12, 12);
    let mut players = vec![fog_map(0, 12, 12), fog_map(1, 12, 12)];
    let mut sight = SightManager::default();

    let scout = unit_at(&mut index, UnitState::new(0).with_sight(2), 5.5, 5.5);
    let enemy = unit_at(&mut index, UnitState::new(1), 8.5, 5.5);
    sight.add_sight(&mut index, &mut players, scout).unwrap();
    assert!(sight.has_sight(scout));
    assert_eq!(players[0].unfogged_count(), 9);
    assert!(!players[0].can_see(&index, enemy));

    index.move_by(scout, FixedVec3::from_f32(2.0, 0.0, 0.0));
    sight.update_sight(&mut index, &mut players, scout).unwrap();
    assert_eq!(players[0].unfogged_count(), 9);
    assert_eq!(players[0].explored_count(), 15);
    assert!(players[0].refs().iter().all(|&count| count <= 1));
    assert!(players[0].can_see(&index, enemy));
    assert!(index.unit(enemy).unwrap().visible_status(0).is_visible());

    sight.remove_sight(&mut index, &mut players, scout).unwrap();
    assert!(sight.is_empty());
    assert_eq!(players[0].unfogged_count(), 0);
    assert_eq!(players[0].explored_count(), 15);
    assert_eq!(players[1].unfogged_count(), 0, "Other players are untouched");
}

#[test]
fn test_fog_record_restores_state() {
    let mut index = SpatialIndex::new(7, 5);
    let mut fog = fog_map(0, 7, 5);
    for (x, y) in [(0, 0), (3, 2), (6, 4)] {
        fog.add_fog_ref(x, y, &mut index).unwrap();
    }
    fog.add_fog_ref(3, 2, &mut index).unwrap();
    fog.explore(1, 1).unwrap();

    let record = fog.save();
    let mut restored = fog_map(0, 7, 5);
    restored.load(&record).unwrap();

    assert_eq!(restored.refs(), fog.refs());
    assert_eq!(restored.explored_bits(), fog.explored_bits());
    assert_eq!(restored.explored_count(), 4);
    assert_eq!(restored.unfogged_count(), 3);
    assert!(restored.drain_events().is_empty());
}

#[test]
fn test_fog_record_lines_are_folded() {
    let fog = fog_map(0, 40, 40);
    let record = fog.save();
    let fogged = record.fogged.unwrap();
    assert!(fogged.lines().count() > 1);
    assert!(fogged.lines().all(|line| line.len() <= 76));
}

#[test]
fn test_fog_record_missing_explored_explores_everything() {
    let mut fog = fog_map(0, 4, 4);
    let result = fog.load(&FogRecord { explored: None, fogged: None });
    assert!(matches!(result, Err(LoadError::MissingTag("Explored"))));
    assert_eq!(fog.explored_count(), 16);
    assert_eq!(fog.unfogged_count(), 0);
}

#[test]
fn test_fog_record_size_mismatch_leaves_state() {
    let mut index = SpatialIndex::new(4, 4);
    let mut small = fog_map(0, 3, 3);
    small.add_fog_ref(1, 1, &mut SpatialIndex::new(3, 3)).unwrap();
    let record = small.save();

    let mut fog = fog_map(0, 4, 4);
    fog.add_fog_ref(2, 2, &mut index).unwrap();
    let result = fog.load(&record);
    assert!(matches!(result, Err(LoadError::SizeMismatch { .. })));
    assert_eq!(fog.explored_count(), 1);
    assert_eq!(fog.fog_ref(2, 2).unwrap(), 1);

    let missing_fogged = FogRecord { explored: fog.save().explored, fogged: None };
    assert!(matches!(fog.load(&missing_fogged), Err(LoadError::MissingTag("Fogged"))));
}
