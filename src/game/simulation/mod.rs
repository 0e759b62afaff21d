/// Simulation layer - deterministic game logic.
///
/// This module is organized into:
/// - **resources**: Simulation resources (tick, terrain, map setup, water view)
/// - **events**: Fog messages published every tick
/// - **systems**: World setup, fixed-step update and the water systems

use bevy::prelude::*;

use crate::game::config::apply_water_settings;
use crate::game::water::RenderEnvironment;

// Module declarations
pub mod events;
pub mod resources;
pub mod systems;

// Re-export commonly used items
pub use events::*;
pub use resources::*;
pub use systems::build_world;

// System sets for organizing execution order
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum SimSet {
    Movement, // Moving units and updating sight
    Fog,      // Publishing fog transitions
}

/// Main simulation plugin
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        // Configure FixedUpdate timestep (overridden by InitialConfig at startup)
        app.insert_resource(Time::<Fixed>::from_seconds(1.0 / 20.0));

        app.init_resource::<SimTick>();
        app.init_resource::<MapSetup>();
        app.init_resource::<LocalPlayer>();
        app.init_resource::<RenderEnvironment>();
        app.init_resource::<WaterView>();

        // Register events
        app.add_message::<CellFogChanged>();
        app.add_message::<CellExploredChanged>();
        app.add_message::<UnitVisibilityChanged>();

        app.configure_sets(FixedUpdate, (SimSet::Movement, SimSet::Fog).chain());

        app.add_systems(Startup, systems::init_world);

        app.add_systems(FixedUpdate, (
            // Increment tick counter first (before all other systems)
            systems::increment_sim_tick.before(SimSet::Movement),
            systems::advance_world.in_set(SimSet::Movement),
            systems::forward_fog_events.in_set(SimSet::Fog),
        ));

        app.add_systems(Update, (
            systems::advance_water_time,
            systems::render_water,
        ).chain().after(apply_water_settings));
    }
}
