//! Map grid: per-cell occupancy/water state and per-corner ground heights.
//!
//! A `width x height` map has `width * height` cells and
//! `(width + 1) * (height + 1)` corners. Cell `(x, y)` is bounded by the
//! corners `(x, y)` and `(x + 1, y + 1)`.

mod file;
mod grid;
mod heightmap;

pub use file::{load_map, save_map, MapData, MAP_VERSION};
pub use grid::{Cell, CellGrid};
pub use heightmap::{GroundHeight, HeightMap};
