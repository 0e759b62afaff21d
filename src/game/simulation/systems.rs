/// Core simulation and water systems.
///
/// Fixed-step systems advance the game world deterministically. The water
/// clock and the water view run every frame and never feed back into it.

use bevy::prelude::*;
use boson_macros::profile;

use super::events::{CellExploredChanged, CellFogChanged, FogMessage, UnitVisibilityChanged};
use super::resources::{LocalPlayer, MapSetup, SimTick, Terrain, WaterView};
use crate::game::config::InitialConfig;
use crate::game::error::LoadError;
use crate::game::map::{HeightMap, MapData};
use crate::game::water::{RenderEnvironment, WaterManager};
use crate::game::world::GameWorld;

// ============================================================================
// World Setup
// ============================================================================

/// Build terrain, game world and water from map data.
///
/// Lakes that fail to load are logged and skipped; the rest of the map is
/// still usable. Fails only if the height data does not match the map size.
pub fn build_world(
    config: &InitialConfig,
    data: &MapData,
    setup: &MapSetup,
) -> Result<(Terrain, GameWorld, WaterManager), LoadError> {
    let heights = data.height_map()?;
    let mut world = GameWorld::new(data.width, data.height);
    for player in &setup.players {
        world.add_player(player.active, player.unexplored, player.fogged);
    }

    let mut water = WaterManager::new(data.width, data.height, config.water_params());
    if let Err(e) = water.load_lakes(&data.lakes, &heights) {
        warn!("Map loaded with broken lakes: {}", e);
    }
    water.init_cell_maps(world.index_mut().grid_mut(), &heights);

    Ok((Terrain(heights), world, water))
}

/// Startup: configure the fixed timestep and create the world resources.
pub fn init_world(
    mut commands: Commands,
    mut fixed_time: ResMut<Time<Fixed>>,
    initial_config: Option<Res<InitialConfig>>,
    setup: Option<Res<MapSetup>>,
) {
    let config = match initial_config {
        Some(cfg) => cfg.clone(),
        None => {
            warn!("InitialConfig not found, using defaults");
            InitialConfig::default()
        }
    };
    let setup = setup.map(|s| s.clone()).unwrap_or_default();

    fixed_time.set_timestep_seconds(1.0 / config.tick_rate);

    let data = setup.data.clone().unwrap_or_else(|| {
        MapData::new(&HeightMap::flat(config.map_width, config.map_height, 0.0), Vec::new())
    });
    match build_world(&config, &data, &setup) {
        Ok((terrain, world, water)) => {
            info!(
                "World ready: {}x{} cells, {} players, {} lakes",
                world.width(),
                world.height(),
                world.players().len(),
                water.lakes().len()
            );
            commands.insert_resource(terrain);
            commands.insert_resource(world);
            commands.insert_resource(water);
        }
        Err(e) => {
            error!("Failed to build world from map: {}", e);
            let (w, h) = (config.map_width, config.map_height);
            commands.insert_resource(Terrain(HeightMap::flat(w, h, 0.0)));
            commands.insert_resource(GameWorld::new(w, h));
            commands.insert_resource(WaterManager::new(w, h, config.water_params()));
        }
    }
}

// ============================================================================
// Fixed Update
// ============================================================================

pub fn increment_sim_tick(mut tick: ResMut<SimTick>) {
    tick.increment();
}

/// Move every moving unit by its velocity and update sight.
#[profile(4)]
pub fn advance_world(mut world: ResMut<GameWorld>, tick: Res<SimTick>) {
    match world.advance() {
        #[allow(unused_variables)]
        Ok(moved) => {
            crate::profile_log!(tick, "[SIM STATUS] Tick: {} | Items: {} | Moved: {}", tick.0, world.index().len(), moved);
        }
        Err(e) => error!("Tick {}: world update failed: {}", tick.0, e),
    }
}

/// Publish the fog transitions queued during this tick.
pub fn forward_fog_events(
    mut world: ResMut<GameWorld>,
    mut fog_changes: MessageWriter<CellFogChanged>,
    mut explored_changes: MessageWriter<CellExploredChanged>,
    mut visibility_changes: MessageWriter<UnitVisibilityChanged>,
) {
    for event in world.drain_events() {
        match FogMessage::from(event) {
            FogMessage::Fog(msg) => {
                fog_changes.write(msg);
            }
            FogMessage::Explored(msg) => {
                explored_changes.write(msg);
            }
            FogMessage::Visibility(msg) => {
                visibility_changes.write(msg);
            }
        }
    }
}

// ============================================================================
// Water
// ============================================================================

pub fn advance_water_time(time: Res<Time>, mut water: ResMut<WaterManager>) {
    water.update(time.delta_secs());
}

/// Rebuild the water geometry in view of the render environment.
#[profile(8)]
pub fn render_water(
    mut view: ResMut<WaterView>,
    mut water: ResMut<WaterManager>,
    terrain: Res<Terrain>,
    world: Res<GameWorld>,
    env: Res<RenderEnvironment>,
    local_player: Res<LocalPlayer>,
) {
    let fog = world.player(local_player.0);
    let view = &mut *view;
    view.draws = view.renderer.render(&mut *water, &*terrain, &*env, fog);
    let stats = view.renderer.statistics();
    debug!("water: {} lakes, {} chunks, {} quads", stats.lakes, stats.chunks, stats.quads);
}
