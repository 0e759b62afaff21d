use bevy::prelude::*;

use crate::game::map::CellGrid;

mod cells;
mod collision;
mod item;
#[cfg(test)]
mod tests;

pub use cells::overlapped_cells;
pub use item::{ItemId, ItemKind, PlayerId, SpatialItem, UnitState, VisibleStatus};

/// Arena of simulation items plus the cell grid that indexes them.
///
/// Items are addressed by [`ItemId`]; cells only store ids, never own items.
/// Every geometry change goes through [`SpatialIndex::move_by`],
/// [`SpatialIndex::move_to`] or [`SpatialIndex::set_size`], which retract the
/// item from its cells, mutate, and re-add it. [`SpatialIndex::despawn`]
/// retracts membership before freeing the slot, so a cell can never refer to
/// a dead item.
///
/// # Performance
///
/// - **Spawn/Despawn:** O(cells covered), slots are recycled
/// - **Occupancy query:** O(items in cell)
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    grid: CellGrid,
    items: Vec<Option<SpatialItem>>,
    free: Vec<u32>,
    len: usize,
}

impl SpatialIndex {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            grid: CellGrid::new(width, height),
            items: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// Mutable access for per-cell map state (water, move cost). Item
    /// membership must not be edited through this.
    pub fn grid_mut(&mut self) -> &mut CellGrid {
        &mut self.grid
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, id: ItemId) -> Option<&SpatialItem> {
        self.items.get(id.index()).and_then(Option::as_ref)
    }

    /// Mutable access to non-geometry state (kind, velocity).
    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut SpatialItem> {
        self.items.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn unit(&self, id: ItemId) -> Option<&UnitState> {
        self.get(id).and_then(|item| item.kind.as_unit())
    }

    pub fn unit_mut(&mut self, id: ItemId) -> Option<&mut UnitState> {
        self.get_mut(id).and_then(|item| item.kind.as_unit_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &SpatialItem)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|item| (ItemId(i as u32), item)))
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Insert an item and add it to the cells it covers.
    pub fn spawn(&mut self, item: SpatialItem) -> ItemId {
        let id = match self.free.pop() {
            Some(slot) => {
                self.items[slot as usize] = Some(item);
                ItemId(slot)
            }
            None => {
                self.items.push(Some(item));
                ItemId((self.items.len() - 1) as u32)
            }
        };
        self.len += 1;
        self.add_to_cells(id);
        id
    }

    /// Remove an item from its cells and free its slot.
    pub fn despawn(&mut self, id: ItemId) -> Option<SpatialItem> {
        if self.get(id).is_some_and(|item| item.in_cells) {
            self.remove_from_cells(id);
        }
        let item = self.items.get_mut(id.index())?.take()?;
        self.free.push(id.0);
        self.len -= 1;
        Some(item)
    }
}
