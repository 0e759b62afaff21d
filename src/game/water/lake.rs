use bevy::prelude::*;
use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};

use super::chunk::WaterChunk;
use super::manager::CornerMask;
use super::LakeAppearance;
use crate::game::error::LoadError;
use crate::game::map::GroundHeight;

// 8-connected neighbours, clockwise from north.
const X_OFFSETS: [i32; 8] = [0, 1, 1, 1, 0, -1, -1, -1];
const Y_OFFSETS: [i32; 8] = [-1, -1, 0, 1, 1, 1, 0, -1];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceType {
    #[default]
    Flat = 0,
    Waves = 1,
}

impl SurfaceType {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(SurfaceType::Flat),
            1 => Some(SurfaceType::Waves),
            _ => None,
        }
    }
}

/// Persisted lake: search area, fill origin, water level and surface type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LakeRecord {
    #[serde(rename = "MinX")]
    pub min_x: i32,
    #[serde(rename = "MinY")]
    pub min_y: i32,
    #[serde(rename = "MaxX")]
    pub max_x: i32,
    #[serde(rename = "MaxY")]
    pub max_y: i32,
    #[serde(rename = "OriginX")]
    pub origin_x: i32,
    #[serde(rename = "OriginY")]
    pub origin_y: i32,
    #[serde(rename = "Level")]
    pub level: f32,
    #[serde(rename = "SurfaceType", default)]
    pub surface_type: i32,
}

/// Time and global wave toggle used to evaluate the lake surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveState {
    pub enabled: bool,
    pub time: f32,
}

/// A single body of water.
#[derive(Debug, Clone)]
pub struct Lake {
    pub level: f32,
    pub surface: SurfaceType,
    pub appearance: LakeAppearance,
    search_min: IVec2,
    search_max: IVec2,
    origin: IVec2,
    pub(crate) min_x: i32,
    pub(crate) min_y: i32,
    pub(crate) max_x: i32,
    pub(crate) max_y: i32,
    corners: FixedBitSet,
    fill_count: usize,
    pub(crate) chunks: Vec<WaterChunk>,
    center: Vec3,
    radius: f32,
}

impl Lake {
    pub fn new(
        level: f32,
        origin: IVec2,
        search_min: IVec2,
        search_max: IVec2,
        surface: SurfaceType,
        appearance: LakeAppearance,
    ) -> Self {
        Self {
            level,
            surface,
            appearance,
            search_min,
            search_max,
            origin,
            min_x: 0,
            min_y: 0,
            max_x: -1,
            max_y: -1,
            corners: FixedBitSet::new(),
            fill_count: 0,
            chunks: Vec::new(),
            center: Vec3::ZERO,
            radius: 0.0,
        }
    }

    pub fn from_record(record: &LakeRecord, appearance: LakeAppearance) -> Result<Self, LoadError> {
        let surface = SurfaceType::from_i32(record.surface_type).ok_or_else(|| LoadError::InvalidAttribute {
            name: "SurfaceType",
            value: record.surface_type.to_string(),
        })?;
        if !record.level.is_finite() {
            return Err(LoadError::InvalidAttribute { name: "Level", value: record.level.to_string() });
        }
        if record.max_x < record.min_x {
            return Err(LoadError::InvalidAttribute { name: "MaxX", value: record.max_x.to_string() });
        }
        if record.max_y < record.min_y {
            return Err(LoadError::InvalidAttribute { name: "MaxY", value: record.max_y.to_string() });
        }
        Ok(Self::new(
            record.level,
            IVec2::new(record.origin_x, record.origin_y),
            IVec2::new(record.min_x, record.min_y),
            IVec2::new(record.max_x, record.max_y),
            surface,
            appearance,
        ))
    }

    /// The record this lake was loaded from: the search area, not the
    /// flood-filled bounding box.
    pub fn to_record(&self) -> LakeRecord {
        LakeRecord {
            min_x: self.search_min.x,
            min_y: self.search_min.y,
            max_x: self.search_max.x,
            max_y: self.search_max.y,
            origin_x: self.origin.x,
            origin_y: self.origin.y,
            level: self.level,
            surface_type: self.surface as i32,
        }
    }

    pub fn origin(&self) -> IVec2 {
        self.origin
    }

    /// Inclusive corner bounding box `(min_x, min_y, max_x, max_y)` after
    /// shore dilation.
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        (self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Number of corners reached by the flood fill (before shore dilation).
    pub fn fill_count(&self) -> usize {
        self.fill_count
    }

    /// Number of member corners, shore included.
    pub fn corner_count(&self) -> usize {
        self.corners.count_ones(..)
    }

    pub fn corner_bits(&self) -> &FixedBitSet {
        &self.corners
    }

    pub fn chunks(&self) -> &[WaterChunk] {
        &self.chunks
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Flood fill the lake from its origin and split it into chunks.
    ///
    /// Visits 8-connected corners inside the search area whose ground is
    /// strictly below the level and that no lake has claimed yet, marking
    /// each in `underwater`. The bounding box is grown by one corner
    /// (within the search area) and every visited corner marks itself and
    /// its eight neighbours as members, which yields the shore strip.
    ///
    /// The origin must lie inside the (map-clipped) search area. A lake whose
    /// origin is outside it is deliberately rejected, never filled from
    /// there, so every filled corner stays inside the saved search area.
    ///
    /// Returns `false` and leaves the lake empty if the origin is rejected or
    /// the corner bitmap would exceed `max_corners`.
    pub fn find_water(
        &mut self,
        underwater: &mut CornerMask,
        heights: &impl GroundHeight,
        chunk_size: i32,
        max_corners: usize,
    ) -> bool {
        // Corners outside the map can never be filled.
        let search_min = self.search_min.max(IVec2::ZERO);
        let search_max = self
            .search_max
            .min(IVec2::new(underwater.width() as i32 - 1, underwater.height() as i32 - 1));
        let in_search = |x: i32, y: i32| {
            x >= search_min.x && x <= search_max.x && y >= search_min.y && y <= search_max.y
        };

        let (ox, oy) = (self.origin.x, self.origin.y);
        if !in_search(ox, oy) {
            error!("lake origin ({}, {}) is outside its search area", ox, oy);
            return false;
        }

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
        let mut open = vec![(ox, oy)];
        let mut closed = Vec::new();
        underwater.set(ox, oy, true);

        while let Some((x, y)) = open.pop() {
            closed.push((x, y));
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            for (dx, dy) in X_OFFSETS.iter().zip(Y_OFFSETS.iter()) {
                let (nx, ny) = (x + dx, y + dy);
                if !in_search(nx, ny) {
                    continue;
                }
                if heights.ground_height(nx, ny) >= self.level {
                    continue;
                }
                if underwater.get(nx, ny) {
                    continue;
                }
                underwater.set(nx, ny, true);
                open.push((nx, ny));
            }
        }

        min_x = (min_x - 1).max(search_min.x);
        min_y = (min_y - 1).max(search_min.y);
        max_x = (max_x + 1).min(search_max.x);
        max_y = (max_y + 1).min(search_max.y);

        let w = (max_x - min_x + 1) as i64;
        let h = (max_y - min_y + 1) as i64;
        let size = w * h;
        if size <= 0 || size > max_corners as i64 {
            error!(
                "lake at ({}, {}) needs {} corners (limit {}), not creating it",
                ox, oy, size, max_corners
            );
            return false;
        }

        self.min_x = min_x;
        self.min_y = min_y;
        self.max_x = max_x;
        self.max_y = max_y;
        self.fill_count = closed.len();
        self.corners = FixedBitSet::with_capacity(size as usize);
        for &(x, y) in &closed {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if let Some(index) = self.corner_index(x + dx, y + dy) {
                        self.corners.insert(index);
                    }
                }
            }
        }

        self.create_chunks(heights, chunk_size);

        let half_w = (self.max_x - self.min_x) as f32 / 2.0;
        let half_h = (self.max_y - self.min_y) as f32 / 2.0;
        self.center = Vec3::new(self.min_x as f32 + half_w, -(self.min_y as f32 + half_h), self.level);
        self.radius = (half_w * half_w + half_h * half_h).sqrt();

        debug!(
            "lake at ({}, {}): {} filled corners, bbox ({}, {})-({}, {}), {} chunks",
            ox,
            oy,
            self.fill_count,
            self.min_x,
            self.min_y,
            self.max_x,
            self.max_y,
            self.chunks.len()
        );
        true
    }

    fn create_chunks(&mut self, heights: &impl GroundHeight, chunk_size: i32) {
        self.chunks.clear();
        let chunk_size = chunk_size.max(1);

        let mut cy = self.min_y;
        while cy < self.max_y {
            let mut cx = self.min_x;
            while cx < self.max_x {
                let x_range = (cx, (cx + chunk_size).min(self.max_x));
                let y_range = (cy, (cy + chunk_size).min(self.max_y));
                if let Some(chunk) = self.build_chunk(heights, x_range, y_range) {
                    self.chunks.push(chunk);
                }
                cx += chunk_size;
            }
            cy += chunk_size;
        }
    }

    fn build_chunk(
        &self,
        heights: &impl GroundHeight,
        (x1, x2): (i32, i32),
        (y1, y2): (i32, i32),
    ) -> Option<WaterChunk> {
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
        let mut min_ground = f32::MAX;
        let mut max_ground = f32::MIN;
        let mut corners = 0;

        for y in y1..=y2 {
            for x in x1..=x2 {
                if !self.has_corner(x, y) {
                    continue;
                }
                corners += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
                let ground = heights.ground_height(x, y);
                min_ground = min_ground.min(ground);
                max_ground = max_ground.max(ground);
            }
        }

        if corners == 0 {
            return None;
        }
        if corners < 4 {
            warn!(
                "dropping lake chunk ({}, {})-({}, {}) with only {} corners",
                x1, y1, x2, y2, corners
            );
            return None;
        }
        Some(WaterChunk::new(min_x, min_y, max_x, max_y, corners, min_ground, max_ground, self.level))
    }

    fn corner_index(&self, x: i32, y: i32) -> Option<usize> {
        if x < self.min_x || x > self.max_x || y < self.min_y || y > self.max_y {
            return None;
        }
        let w = (self.max_x - self.min_x + 1) as usize;
        Some((y - self.min_y) as usize * w + (x - self.min_x) as usize)
    }

    /// Whether corner `(x, y)` belongs to the lake. `false` outside the bounding box.
    pub fn has_corner(&self, x: i32, y: i32) -> bool {
        self.corner_index(x, y).is_some_and(|index| self.corners.contains(index))
    }

    /// Whether any corner of the rectangle `(x1, y1)..=(x2, y2)` belongs to
    /// the lake. Coordinates are truncated and clipped to the bounding box.
    pub fn has_any_corner(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> bool {
        let (x1, y1, x2, y2) = (x1 as i32, y1 as i32, x2 as i32, y2 as i32);
        if self.has_corner(x1.max(self.min_x), y1.max(self.min_y)) {
            return true;
        }
        for y in y1.max(self.min_y)..=y2.min(self.max_y) {
            for x in x1.max(self.min_x)..=x2.min(self.max_x) {
                if self.has_corner(x, y) {
                    return true;
                }
            }
        }
        false
    }

    fn wave_amplitude(&self, x: f32, y: f32, heights: &impl GroundHeight) -> f32 {
        let a = &self.appearance;
        ((heights.ground_height_at(x, y) - self.level) * a.wave_vector.z)
            .clamp(a.wave_height_min, a.wave_height_max)
    }

    fn wave_phase(&self, x: f32, y: f32, time: f32) -> f32 {
        let a = &self.appearance;
        x * a.wave_vector.x + y * a.wave_vector.y + a.wave_speed * time
    }

    /// Water surface height at map position `(x, y)`.
    pub fn height(&self, x: f32, y: f32, heights: &impl GroundHeight, waves: WaveState) -> f32 {
        if self.surface == SurfaceType::Flat || !waves.enabled {
            return self.level;
        }
        self.level + self.wave_phase(x, y, waves.time).sin() * self.wave_amplitude(x, y, heights)
    }

    /// Derivative of the wave function along the wave direction.
    pub fn wave_derivative(&self, x: f32, y: f32, heights: &impl GroundHeight, time: f32) -> f32 {
        self.wave_phase(x, y, time).cos() * self.wave_amplitude(x, y, heights)
    }

    /// Surface opacity: deeper water is more opaque, capped at 1.
    pub fn alpha_at(&self, x: f32, y: f32, heights: &impl GroundHeight, waves: WaveState) -> f32 {
        let depth = self.height(x, y, heights, waves) - heights.ground_height_at(x, y);
        (depth * self.appearance.alpha_multiplier + self.appearance.alpha_base).min(1.0)
    }
}
