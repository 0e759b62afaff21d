use crate::game::error::{GridError, LoadError};

/// Ground height provider, queried per map corner.
pub trait GroundHeight {
    /// Height at corner `(x, y)`. Corners outside the map read as `0.0`.
    fn ground_height(&self, x: i32, y: i32) -> f32;

    /// Height at an arbitrary map position, using the corner at the
    /// truncated coordinates.
    fn ground_height_at(&self, x: f32, y: f32) -> f32 {
        self.ground_height(x as i32, y as i32)
    }
}

/// Per-corner ground heights of a `width x height` cell map.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightMap {
    width: u32,
    height: u32,
    heights: Vec<f32>,
}

impl HeightMap {
    /// A flat map with every corner at `value`.
    pub fn flat(width: u32, height: u32, value: f32) -> Self {
        let corners = (width as usize + 1) * (height as usize + 1);
        Self { width, height, heights: vec![value; corners] }
    }

    pub fn from_heights(width: u32, height: u32, heights: Vec<f32>) -> Result<Self, LoadError> {
        let expected = (width as usize + 1) * (height as usize + 1);
        if heights.len() != expected {
            return Err(LoadError::SizeMismatch { expected, found: heights.len() });
        }
        Ok(Self { width, height, heights })
    }

    /// Width in cells.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in cells.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn is_valid_corner(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x as u32 <= self.width && y as u32 <= self.height
    }

    fn corner_index(&self, x: i32, y: i32) -> Result<usize, GridError> {
        if !self.is_valid_corner(x, y) {
            return Err(GridError::OutOfRange {
                x,
                y,
                width: self.width + 1,
                height: self.height + 1,
            });
        }
        Ok(y as usize * (self.width as usize + 1) + x as usize)
    }

    pub fn corner_height(&self, x: i32, y: i32) -> Result<f32, GridError> {
        let index = self.corner_index(x, y)?;
        Ok(self.heights[index])
    }

    pub fn set_corner_height(&mut self, x: i32, y: i32, value: f32) -> Result<(), GridError> {
        let index = self.corner_index(x, y)?;
        self.heights[index] = value;
        Ok(())
    }
}

impl GroundHeight for HeightMap {
    fn ground_height(&self, x: i32, y: i32) -> f32 {
        self.corner_height(x, y).unwrap_or(0.0)
    }
}
