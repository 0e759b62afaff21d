use bevy::prelude::*;
use smallvec::SmallVec;

use super::{ItemId, SpatialIndex, SpatialItem};
use crate::game::fixed_math::{FixedNum, FixedVec3};

/// Cells whose area the item's bounding rectangle intersects on a
/// `width x height` map.
///
/// Right and bottom edges are exclusive, so an edge lying on a grid line
/// does not reach into the next cell. A zero-size box still covers the cell
/// it sits in. The range is clamped into the map, so items partially (or
/// entirely) off the map still map to valid cells. Returns no cells on an
/// empty map.
pub fn overlapped_cells(item: &SpatialItem, width: u32, height: u32) -> SmallVec<[(i32, i32); 4]> {
    let mut cells = SmallVec::new();
    if width == 0 || height == 0 {
        return cells;
    }

    let left = item.left_edge().floor().to_num::<i32>().max(0);
    let top = item.top_edge().floor().to_num::<i32>().max(0);
    let right = item.right_edge().ceil().to_num::<i32>().max(left + 1).min(width as i32);
    let bottom = item.bottom_edge().ceil().to_num::<i32>().max(top + 1).min(height as i32);
    let left = left.min(right - 1);
    let top = top.min(bottom - 1);

    for y in top..bottom {
        for x in left..right {
            cells.push((x, y));
        }
    }
    cells
}

impl SpatialIndex {
    pub fn compute_overlapped_cells(&self, id: ItemId) -> SmallVec<[(i32, i32); 4]> {
        match self.get(id) {
            Some(item) => overlapped_cells(item, self.grid.width(), self.grid.height()),
            None => SmallVec::new(),
        }
    }

    /// Register the item in every cell it overlaps. Shots are never added.
    pub fn add_to_cells(&mut self, id: ItemId) {
        let (width, height) = (self.grid.width(), self.grid.height());
        let Some(item) = self.items.get_mut(id.index()).and_then(Option::as_mut) else {
            warn!("add_to_cells: unknown item {:?}", id);
            return;
        };
        if item.kind.is_shot() {
            return;
        }
        if item.in_cells {
            error!("add_to_cells: item {:?} is already in cells", id);
            return;
        }

        item.cells = overlapped_cells(item, width, height);
        item.cells_dirty = false;
        item.in_cells = true;
        for &(x, y) in &item.cells {
            if let Ok(cell) = self.grid.cell_mut(x, y) {
                cell.add_item(id);
            }
        }
    }

    /// Retract the item from the cells recorded at the last `add_to_cells`.
    pub fn remove_from_cells(&mut self, id: ItemId) {
        let Some(item) = self.items.get_mut(id.index()).and_then(Option::as_mut) else {
            warn!("remove_from_cells: unknown item {:?}", id);
            return;
        };
        if item.kind.is_shot() {
            return;
        }
        if !item.in_cells {
            error!("remove_from_cells: item {:?} was never added to cells", id);
            return;
        }

        for &(x, y) in &item.cells {
            let removed = self.grid.cell_mut(x, y).map(|cell| cell.remove_item(id)).unwrap_or(false);
            if !removed {
                error!("remove_from_cells: item {:?} missing from cell ({}, {})", id, x, y);
            }
        }
        item.in_cells = false;
    }

    /// Returns `false` if the item does not exist.
    pub fn move_by(&mut self, id: ItemId, delta: FixedVec3) -> bool {
        self.change_geometry(id, |item| item.position += delta)
    }

    pub fn move_to(&mut self, id: ItemId, position: FixedVec3) -> bool {
        self.change_geometry(id, |item| item.position = position)
    }

    pub fn set_size(&mut self, id: ItemId, width: FixedNum, height: FixedNum, depth: FixedNum) -> bool {
        self.change_geometry(id, |item| item.size = FixedVec3::new(width, height, depth))
    }

    fn change_geometry(&mut self, id: ItemId, change: impl FnOnce(&mut SpatialItem)) -> bool {
        let Some(was_in_cells) = self.get(id).map(|item| item.in_cells) else {
            return false;
        };
        if was_in_cells {
            self.remove_from_cells(id);
        }
        if let Some(item) = self.get_mut(id) {
            change(item);
            item.cells_dirty = true;
        }
        if was_in_cells {
            self.add_to_cells(id);
        }
        true
    }
}
