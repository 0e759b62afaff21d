use bevy::prelude::*;

pub mod config;
pub mod error;
pub mod fixed_math;
pub mod fog;
pub mod map;
pub mod simulation;
pub mod spatial;
pub mod water;
pub mod world;

use config::ConfigPlugin;
use simulation::SimulationPlugin;

/// Simulation core: configuration, the game world with fog of war, and lakes.
///
/// Needs `MinimalPlugins` (or `DefaultPlugins`) and `AssetPlugin`.
pub struct BosonPlugin;

impl Plugin for BosonPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((ConfigPlugin, SimulationPlugin));
    }
}
