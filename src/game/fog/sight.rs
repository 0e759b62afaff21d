use bevy::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use super::PlayerFog;
use crate::game::error::FogError;
use crate::game::spatial::{ItemId, PlayerId, SpatialIndex};

/// Cells within `range` of `(cx, cy)` (strictly inside the circle), clipped
/// to a `width x height` map.
pub fn sight_circle(cx: i32, cy: i32, range: u32, width: u32, height: u32) -> Vec<(i32, i32)> {
    let sight = range as i32;
    let left = (cx - sight).max(0) - cx;
    let right = (cx + sight).min(width as i32) - cx;
    let top = (cy - sight).max(0) - cy;
    let bottom = (cy + sight).min(height as i32) - cy;

    let mut cells = Vec::new();
    for j in top..bottom {
        for i in left..right {
            if i * i + j * j < sight * sight {
                cells.push((cx + i, cy + j));
            }
        }
    }
    cells
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sight {
    owner: PlayerId,
    center: (i32, i32),
    range: u32,
}

/// Tracks which fog refs each seeing unit currently holds.
///
/// Every unit with a sight range holds one fog ref on each cell of its
/// sight circle for its owner. Moving the unit only touches the cells that
/// enter or leave the circle.
#[derive(Debug, Clone, Default)]
pub struct SightManager {
    sights: FxHashMap<ItemId, Sight>,
}

impl SightManager {
    pub fn has_sight(&self, id: ItemId) -> bool {
        self.sights.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sights.is_empty()
    }

    /// Start tracking a unit's sight. Units without sight, destroyed units
    /// and units already tracked are ignored.
    pub fn add_sight(
        &mut self,
        index: &mut SpatialIndex,
        players: &mut [PlayerFog],
        id: ItemId,
    ) -> Result<(), FogError> {
        if self.sights.contains_key(&id) {
            return Ok(());
        }
        let Some(sight) = Self::current_sight(index, id) else {
            return Ok(());
        };
        if let Some(fog) = players.get_mut(sight.owner as usize) {
            for (x, y) in Self::cells_of(index, sight) {
                fog.add_fog_ref(x, y, index)?;
            }
        } else {
            warn!("unit {:?} owned by unknown player {}", id, sight.owner);
        }
        self.sights.insert(id, sight);
        update_visible_status(index, players, id);
        Ok(())
    }

    /// Release every fog ref the unit holds.
    pub fn remove_sight(
        &mut self,
        index: &mut SpatialIndex,
        players: &mut [PlayerFog],
        id: ItemId,
    ) -> Result<(), FogError> {
        let Some(sight) = self.sights.remove(&id) else {
            return Ok(());
        };
        if let Some(fog) = players.get_mut(sight.owner as usize) {
            for (x, y) in Self::cells_of(index, sight) {
                fog.remove_fog_ref(x, y, index)?;
            }
        }
        Ok(())
    }

    /// Bring the unit's fog refs in line with its current position and
    /// range, then refresh its visibility to the other players.
    pub fn update_sight(
        &mut self,
        index: &mut SpatialIndex,
        players: &mut [PlayerFog],
        id: ItemId,
    ) -> Result<(), FogError> {
        match (self.sights.get(&id).copied(), Self::current_sight(index, id)) {
            (None, Some(_)) => self.add_sight(index, players, id)?,
            (Some(_), None) => self.remove_sight(index, players, id)?,
            (Some(old), Some(new)) if old.owner != new.owner => {
                self.remove_sight(index, players, id)?;
                self.add_sight(index, players, id)?;
            }
            (Some(old), Some(new)) if old != new => {
                let old_cells = Self::cells_of(index, old);
                let new_cells = Self::cells_of(index, new);
                let old_set: FxHashSet<(i32, i32)> = old_cells.iter().copied().collect();
                let new_set: FxHashSet<(i32, i32)> = new_cells.iter().copied().collect();

                if let Some(fog) = players.get_mut(new.owner as usize) {
                    for &(x, y) in new_cells.iter().filter(|cell| !old_set.contains(*cell)) {
                        fog.add_fog_ref(x, y, index)?;
                    }
                    for &(x, y) in old_cells.iter().filter(|cell| !new_set.contains(*cell)) {
                        fog.remove_fog_ref(x, y, index)?;
                    }
                }
                self.sights.insert(id, new);
            }
            _ => {}
        }

        update_visible_status(index, players, id);
        Ok(())
    }

    fn current_sight(index: &SpatialIndex, id: ItemId) -> Option<Sight> {
        let item = index.get(id)?;
        let unit = item.kind.as_unit()?;
        if unit.destroyed || unit.sight_range == 0 {
            return None;
        }
        Some(Sight { owner: unit.owner, center: item.center_cell(), range: unit.sight_range })
    }

    fn cells_of(index: &SpatialIndex, sight: Sight) -> Vec<(i32, i32)> {
        let grid = index.grid();
        sight_circle(sight.center.0, sight.center.1, sight.range, grid.width(), grid.height())
    }
}

/// Refresh a unit's visible status for every active player except its owner.
pub fn update_visible_status(index: &mut SpatialIndex, players: &mut [PlayerFog], id: ItemId) {
    let Some(owner) = index.unit(id).map(|unit| unit.owner) else {
        return;
    };
    for fog in players.iter_mut().filter(|fog| fog.player() != owner) {
        fog.refresh_unit(index, id);
    }
}
