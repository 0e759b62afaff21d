//! Per-player fog of war.
//!
//! Every cell is in one of three states for a player: unexplored,
//! explored-but-fogged, or visible. Visibility is reference counted: each
//! sight source covering a cell holds one fog ref, and the cell is visible
//! while the count is above zero.
//!
//! State transitions are reported through a queue of [`FogEvent`]s that the
//! simulation drains every tick and forwards as Bevy messages.

use bevy::prelude::*;
use fixedbitset::FixedBitSet;
use smallvec::SmallVec;

use crate::game::error::{FogError, GridError};
use crate::game::spatial::{ItemId, PlayerId, SpatialIndex, VisibleStatus};

mod persist;
mod sight;
#[cfg(test)]
mod tests;

pub use persist::FogRecord;
pub use sight::{sight_circle, update_visible_status, SightManager};

/// A fog state transition or a change of a unit's visibility to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FogEvent {
    Fogged { player: PlayerId, x: i32, y: i32 },
    Unfogged { player: PlayerId, x: i32, y: i32 },
    Explored { player: PlayerId, x: i32, y: i32 },
    Unexplored { player: PlayerId, x: i32, y: i32 },
    UnitVisibilityChanged { player: PlayerId, unit: ItemId, status: VisibleStatus },
}

#[derive(Debug, Clone)]
pub struct PlayerFog {
    player: PlayerId,
    /// Observers and neutral players do not update unit visibility.
    active: bool,
    width: u32,
    height: u32,
    explored: FixedBitSet,
    refs: Vec<u16>,
    explored_count: u32,
    unfogged_count: u32,
    events: Vec<FogEvent>,
}

impl PlayerFog {
    pub fn new(player: PlayerId, active: bool) -> Self {
        Self {
            player,
            active,
            width: 0,
            height: 0,
            explored: FixedBitSet::new(),
            refs: Vec::new(),
            explored_count: 0,
            unfogged_count: 0,
            events: Vec::new(),
        }
    }

    /// Allocate the fog map. Does nothing if the map is already initialized.
    ///
    /// `unexplored` starts every cell unexplored, `fogged` starts every cell
    /// with zero fog refs; otherwise cells start explored and with one ref.
    pub fn init_map(&mut self, width: u32, height: u32, unexplored: bool, fogged: bool) {
        if !self.refs.is_empty() {
            return;
        }
        let cells = width as usize * height as usize;
        self.width = width;
        self.height = height;
        self.explored = FixedBitSet::with_capacity(cells);
        if !unexplored {
            self.explored.insert_range(..);
        }
        self.refs = vec![if fogged { 0 } else { 1 }; cells];
        self.recount();
        debug!(
            "player {} fog map {}x{} (explored {}, unfogged {})",
            self.player, width, height, self.explored_count, self.unfogged_count
        );
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn explored_count(&self) -> u32 {
        self.explored_count
    }

    pub fn unfogged_count(&self) -> u32 {
        self.unfogged_count
    }

    fn index(&self, x: i32, y: i32) -> Result<usize, GridError> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return Err(GridError::OutOfRange { x, y, width: self.width, height: self.height });
        }
        Ok(y as usize * self.width as usize + x as usize)
    }

    pub fn is_explored(&self, x: i32, y: i32) -> Result<bool, GridError> {
        Ok(self.explored.contains(self.index(x, y)?))
    }

    pub fn is_fogged(&self, x: i32, y: i32) -> Result<bool, GridError> {
        Ok(self.refs[self.index(x, y)?] == 0)
    }

    pub fn fog_ref(&self, x: i32, y: i32) -> Result<u16, GridError> {
        Ok(self.refs[self.index(x, y)?])
    }

    /// Raw reference counts, row by row.
    pub fn refs(&self) -> &[u16] {
        &self.refs
    }

    pub fn explored_bits(&self) -> &FixedBitSet {
        &self.explored
    }

    /// Take all queued events.
    pub fn drain_events(&mut self) -> Vec<FogEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn explore(&mut self, x: i32, y: i32) -> Result<(), GridError> {
        let index = self.index(x, y)?;
        if self.explored.contains(index) {
            return Ok(());
        }
        self.explored.insert(index);
        self.explored_count += 1;
        self.events.push(FogEvent::Explored { player: self.player, x, y });
        Ok(())
    }

    pub fn unexplore(&mut self, x: i32, y: i32) -> Result<(), GridError> {
        let index = self.index(x, y)?;
        if !self.explored.contains(index) {
            return Ok(());
        }
        self.explored.set(index, false);
        if self.explored_count == 0 {
            error!("player {}: explored count already zero at ({}, {})", self.player, x, y);
        } else {
            self.explored_count -= 1;
        }
        self.events.push(FogEvent::Unexplored { player: self.player, x, y });
        Ok(())
    }

    /// Add a sight reference. The 0 -> 1 transition explores and unfogs the cell.
    pub fn add_fog_ref(&mut self, x: i32, y: i32, index: &mut SpatialIndex) -> Result<(), FogError> {
        let i = self.index(x, y)?;
        let count = self.refs[i];
        if count == u16::MAX {
            error!("player {}: fog ref overflow at ({}, {})", self.player, x, y);
            return Err(FogError::RefCountOverflow { x, y });
        }
        self.refs[i] = count + 1;
        if count == 0 {
            self.explore(x, y)?;
            self.unfog(x, y, index);
        }
        Ok(())
    }

    /// Release a sight reference. The 1 -> 0 transition fogs the cell.
    ///
    /// Releasing a zero count means some sight source was released twice;
    /// it is logged and rejected without changing any state.
    pub fn remove_fog_ref(&mut self, x: i32, y: i32, index: &mut SpatialIndex) -> Result<(), FogError> {
        let i = self.index(x, y)?;
        let count = self.refs[i];
        if count == 0 {
            error!("player {}: fog ref at ({}, {}) is already zero", self.player, x, y);
            return Err(FogError::RefCountUnderflow { x, y });
        }
        self.refs[i] = count - 1;
        if count == 1 {
            self.fog(x, y, index);
        }
        Ok(())
    }

    fn unfog(&mut self, x: i32, y: i32, index: &mut SpatialIndex) {
        self.unfogged_count += 1;
        self.events.push(FogEvent::Unfogged { player: self.player, x, y });
        self.refresh_cell_units(x, y, index);
    }

    fn fog(&mut self, x: i32, y: i32, index: &mut SpatialIndex) {
        if self.unfogged_count == 0 {
            error!("player {}: unfogged count already zero at ({}, {})", self.player, x, y);
        } else {
            self.unfogged_count -= 1;
        }
        self.events.push(FogEvent::Fogged { player: self.player, x, y });
        self.refresh_cell_units(x, y, index);
    }

    fn refresh_cell_units(&mut self, x: i32, y: i32, index: &mut SpatialIndex) {
        if !self.active {
            return;
        }
        let units: SmallVec<[ItemId; 8]> = match index.grid().cell(x, y) {
            Ok(cell) => cell.items().iter().copied().collect(),
            Err(_) => return,
        };
        for unit in units {
            self.refresh_unit(index, unit);
        }
    }

    /// Whether any cell the item covers is visible to this player.
    pub fn can_see(&self, index: &SpatialIndex, id: ItemId) -> bool {
        let Some(item) = index.get(id) else {
            return false;
        };
        item.cells()
            .iter()
            .any(|&(x, y)| self.is_fogged(x, y).is_ok_and(|fogged| !fogged))
    }

    /// Recompute a unit's visible status for this player.
    ///
    /// A seen unit becomes `VISIBLE`; facilities also gain `EARLIER`, which
    /// they keep after the cell is fogged again so the player retains a
    /// ghost of the building. Mobile units only lose `VISIBLE`. A player
    /// always sees their own units, so those are left alone.
    pub fn refresh_unit(&mut self, index: &mut SpatialIndex, id: ItemId) {
        if !self.active {
            return;
        }
        let seen = self.can_see(index, id);
        let player = self.player;
        let Some(unit) = index.unit_mut(id) else {
            return;
        };
        if unit.owner == player {
            return;
        }

        let mut status = unit.visible_status(player);
        if seen {
            status.insert(VisibleStatus::VISIBLE);
            if unit.facility {
                status.insert(VisibleStatus::EARLIER);
            }
        } else {
            status.remove(VisibleStatus::VISIBLE);
        }
        if unit.set_visible_status(player, status) {
            self.events.push(FogEvent::UnitVisibilityChanged { player, unit: id, status });
        }
    }

    fn recount(&mut self) {
        self.explored_count = self.explored.count_ones(..) as u32;
        self.unfogged_count = self.refs.iter().filter(|&&count| count > 0).count() as u32;
    }
}
