use smallvec::SmallVec;

use crate::game::error::GridError;
use crate::game::spatial::ItemId;

/// A single map tile.
///
/// The item list is a membership list only: the items themselves live in the
/// [`SpatialIndex`](crate::game::spatial::SpatialIndex) arena.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    items: SmallVec<[ItemId; 4]>,
    pub is_water: bool,
    pub move_cost: u8,
}

impl Cell {
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains(&id)
    }

    /// Returns `false` if the item was already in the cell.
    pub fn add_item(&mut self, id: ItemId) -> bool {
        if self.items.contains(&id) {
            return false;
        }
        self.items.push(id);
        true
    }

    /// Returns `false` if the item was not in the cell. Order is not preserved.
    pub fn remove_item(&mut self, id: ItemId) -> bool {
        match self.items.iter().position(|&other| other == id) {
            Some(index) => {
                self.items.swap_remove(index);
                true
            }
            None => false,
        }
    }
}

/// Fixed-size 2D array of cells, allocated once per map.
#[derive(Debug, Clone)]
pub struct CellGrid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl CellGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    pub fn index(&self, x: i32, y: i32) -> Result<usize, GridError> {
        if !self.contains(x, y) {
            return Err(GridError::OutOfRange { x, y, width: self.width, height: self.height });
        }
        Ok(y as usize * self.width as usize + x as usize)
    }

    pub fn cell(&self, x: i32, y: i32) -> Result<&Cell, GridError> {
        let index = self.index(x, y)?;
        Ok(&self.cells[index])
    }

    pub fn cell_mut(&mut self, x: i32, y: i32) -> Result<&mut Cell, GridError> {
        let index = self.index(x, y)?;
        Ok(&mut self.cells[index])
    }

    /// Iterate all cells with their coordinates, row by row.
    pub fn iter(&self) -> impl Iterator<Item = ((i32, i32), &Cell)> {
        let width = self.width as usize;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (((i % width) as i32, (i / width) as i32), cell))
    }

    /// Total number of item memberships over all cells.
    pub fn total_entries(&self) -> usize {
        self.cells.iter().map(|cell| cell.items.len()).sum()
    }
}
