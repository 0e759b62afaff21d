/// Resource definitions for the simulation.
///
/// The game world, terrain and water live in resources; systems reach them
/// through `Res`/`ResMut` and never hold them across ticks.

use bevy::prelude::*;

use crate::game::map::{GroundHeight, HeightMap, MapData};
use crate::game::spatial::PlayerId;
use crate::game::water::{ChunkDraw, RenderStatistics, WaterRenderer};

// ============================================================================
// Tick Counter
// ============================================================================

/// Number of fixed simulation steps run so far.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 += 1;
    }
}

// ============================================================================
// Map Resources
// ============================================================================

/// Corner heights of the loaded map.
#[derive(Resource, Debug, Clone)]
pub struct Terrain(pub HeightMap);

impl GroundHeight for Terrain {
    fn ground_height(&self, x: i32, y: i32) -> f32 {
        self.0.ground_height(x, y)
    }
}

/// Fog setup of one player slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSetup {
    pub active: bool,
    pub unexplored: bool,
    pub fogged: bool,
}

impl Default for PlayerSetup {
    fn default() -> Self {
        Self { active: true, unexplored: true, fogged: true }
    }
}

/// Map and players to build the world from at startup. Without map data a
/// flat, dry map of the configured size is used.
#[derive(Resource, Debug, Clone)]
pub struct MapSetup {
    pub data: Option<MapData>,
    pub players: Vec<PlayerSetup>,
}

impl Default for MapSetup {
    fn default() -> Self {
        Self { data: None, players: vec![PlayerSetup::default()] }
    }
}

/// Player whose fog culls the water view.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalPlayer(pub PlayerId);

// ============================================================================
// Water View
// ============================================================================

/// Water renderer state and the draw list of the last frame.
#[derive(Resource, Debug, Default)]
pub struct WaterView {
    pub renderer: WaterRenderer,
    pub draws: Vec<ChunkDraw>,
}

impl WaterView {
    pub fn statistics(&self) -> RenderStatistics {
        self.renderer.statistics()
    }
}
