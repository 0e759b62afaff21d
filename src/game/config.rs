use bevy::prelude::*;
use bevy_common_assets::ron::RonAssetPlugin;
use serde::{Deserialize, Serialize};

use crate::game::water::{LakeAppearance, WaterManager, WaterParams};

pub const INITIAL_CONFIG_PATH: &str = "assets/initial_config.ron";

/// Static configuration loaded once at startup. Map dimensions, chunking and
/// lake appearance feed deterministic state and must not change mid-game.
#[derive(Resource, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct InitialConfig {
    // Simulation
    pub tick_rate: f64,
    pub map_width: u32,
    pub map_height: u32,

    // Water
    pub water_chunk_size: i32,
    pub max_lake_corners: usize,
    pub texture_repeat: f32,
    pub wave_vector: Vec3,
    pub wave_speed: f32,
    pub wave_height_min: f32,
    pub wave_height_max: f32,
    pub water_alpha_multiplier: f32,
    pub water_alpha_base: f32,
}

impl Default for InitialConfig {
    fn default() -> Self {
        let appearance = LakeAppearance::default();
        Self {
            tick_rate: 20.0,
            map_width: 128,
            map_height: 128,
            water_chunk_size: crate::game::water::DEFAULT_CHUNK_SIZE,
            max_lake_corners: crate::game::water::DEFAULT_MAX_LAKE_CORNERS,
            texture_repeat: 10.0,
            wave_vector: appearance.wave_vector,
            wave_speed: appearance.wave_speed,
            wave_height_min: appearance.wave_height_min,
            wave_height_max: appearance.wave_height_max,
            water_alpha_multiplier: appearance.alpha_multiplier,
            water_alpha_base: appearance.alpha_base,
        }
    }
}

impl InitialConfig {
    /// Parse a RON document.
    pub fn from_ron(contents: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(contents)
    }

    pub fn water_params(&self) -> WaterParams {
        WaterParams {
            chunk_size: self.water_chunk_size,
            max_lake_corners: self.max_lake_corners,
            texture_repeat: self.texture_repeat,
            appearance: LakeAppearance {
                wave_vector: self.wave_vector,
                wave_speed: self.wave_speed,
                wave_height_min: self.wave_height_min,
                wave_height_max: self.wave_height_max,
                alpha_multiplier: self.water_alpha_multiplier,
                alpha_base: self.water_alpha_base,
            },
        }
    }
}

/// Water rendering options. Hot-reloaded from `water_settings.ron`; none of
/// them affect the simulation.
#[derive(Deserialize, Serialize, Asset, TypePath, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct WaterSettings {
    pub reflections: bool,
    pub bumpmapping: bool,
    pub animated_bumpmaps: bool,
    pub translucency: bool,
    pub waves: bool,
    /// Wave normals from the analytic derivative instead of averaged cell normals.
    pub derived_wave_normals: bool,
}

impl Default for WaterSettings {
    fn default() -> Self {
        Self {
            reflections: true,
            bumpmapping: true,
            animated_bumpmaps: true,
            translucency: true,
            waves: true,
            derived_wave_normals: true,
        }
    }
}

#[derive(Resource)]
pub struct WaterSettingsHandle(pub Handle<WaterSettings>);

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RonAssetPlugin::<WaterSettings>::new(&["water_settings.ron"]))
            .add_systems(PreStartup, load_initial_config)
            .add_systems(Startup, setup_water_settings)
            .add_systems(Update, apply_water_settings);
    }
}

/// Load static initial configuration synchronously at startup.
/// Everything built from the map depends on these values.
fn load_initial_config(mut commands: Commands) {
    match std::fs::read_to_string(INITIAL_CONFIG_PATH) {
        Ok(contents) => match InitialConfig::from_ron(&contents) {
            Ok(config) => {
                info!("Loaded initial config from {}", INITIAL_CONFIG_PATH);
                commands.insert_resource(config);
            }
            Err(e) => {
                error!("Failed to parse initial config: {}", e);
                error!("Using default InitialConfig");
                commands.insert_resource(InitialConfig::default());
            }
        },
        Err(e) => {
            error!("Failed to read {}: {}", INITIAL_CONFIG_PATH, e);
            error!("Using default InitialConfig");
            commands.insert_resource(InitialConfig::default());
        }
    }
}

fn setup_water_settings(mut commands: Commands, asset_server: Res<AssetServer>) {
    let handle = asset_server.load("water_settings.ron");
    commands.insert_resource(WaterSettingsHandle(handle));
}

/// Push loaded or edited water settings into the water manager.
pub fn apply_water_settings(
    handle: Option<Res<WaterSettingsHandle>>,
    settings: Res<Assets<WaterSettings>>,
    water: Option<ResMut<WaterManager>>,
    mut events: MessageReader<AssetEvent<WaterSettings>>,
) {
    let (Some(handle), Some(mut water)) = (handle, water) else {
        events.clear();
        return;
    };
    for event in events.read() {
        if event.is_modified(handle.0.id()) || event.is_loaded_with_dependencies(handle.0.id()) {
            if let Some(settings) = settings.get(&handle.0) {
                info!("Water settings loaded/updated");
                water.reload_configuration(*settings);
            }
        }
    }
}
