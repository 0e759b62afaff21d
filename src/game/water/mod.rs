//! Lakes: flood-fill detection, chunking and per-frame chunk geometry.
//!
//! A lake is created from a persisted [`LakeRecord`] (search area, origin,
//! level). [`Lake::find_water`] flood fills the corners below the level,
//! dilates the result by one corner for the shore and partitions the
//! bounding box into chunks. [`WaterRenderer`] then builds vertex, lighting
//! and index data per chunk, caching it until the chunk is marked dirty.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

mod chunk;
mod frustum;
mod lake;
mod manager;
mod render;

pub use chunk::{ChunkGeometry, WaterChunk};
pub use frustum::Frustum;
pub use lake::{Lake, LakeRecord, SurfaceType, WaveState};
pub use manager::{CornerMask, RenderCapabilities, WaterManager};
pub use render::{ChunkDraw, RenderEnvironment, RenderStatistics, WaterRenderer};

/// Corners a lake chunk spans on each axis.
pub const DEFAULT_CHUNK_SIZE: i32 = 10;
/// Upper bound on the corner bitmap of a single lake.
pub const DEFAULT_MAX_LAKE_CORNERS: usize = 4_194_304;
/// Offset added to the elapsed water time so waves do not start in phase.
pub const WATER_TIME_OFFSET: f32 = 10.637_986;

/// Wave and translucency parameters of a lake surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LakeAppearance {
    /// x/y: wave direction, z: how strongly depth scales wave height.
    pub wave_vector: Vec3,
    pub wave_speed: f32,
    pub wave_height_min: f32,
    pub wave_height_max: f32,
    pub alpha_multiplier: f32,
    pub alpha_base: f32,
}

impl Default for LakeAppearance {
    fn default() -> Self {
        Self {
            wave_vector: Vec3::new(0.866, 0.5, 0.3),
            wave_speed: 1.0,
            wave_height_min: 0.2,
            wave_height_max: 2.0,
            alpha_multiplier: 0.8,
            alpha_base: 0.2,
        }
    }
}

/// Construction parameters for [`WaterManager`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterParams {
    pub chunk_size: i32,
    pub max_lake_corners: usize,
    pub texture_repeat: f32,
    pub appearance: LakeAppearance,
}

impl Default for WaterParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_lake_corners: DEFAULT_MAX_LAKE_CORNERS,
            texture_repeat: 10.0,
            appearance: LakeAppearance::default(),
        }
    }
}
