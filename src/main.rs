use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use rand::Rng;

use boson::game::config::InitialConfig;
use boson::game::fixed_math::{FixedNum, FixedVec3};
use boson::game::map::{load_map, save_map, HeightMap, MapData};
use boson::game::simulation::{MapSetup, PlayerSetup, SimTick, Terrain, WaterView};
use boson::game::spatial::{SpatialItem, UnitState};
use boson::game::water::{LakeRecord, WaterManager};
use boson::game::world::GameWorld;
use boson::game::BosonPlugin;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEMO_UNITS: usize = 24;

fn setup_file_logging() -> String {
    // Create logs directory if it doesn't exist
    let log_dir = PathBuf::from("logs");
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create logs directory: {}", e);
    }

    // Clean up old log files, keeping only the last 25
    cleanup_old_logs(&log_dir, 25);

    let now = chrono::Local::now();
    let log_filename = format!("boson_{}.log", now.format("%Y%m%d_%H%M%S"));
    let log_path_str = log_dir.join(&log_filename).to_string_lossy().to_string();

    let file_appender = RollingFileAppender::new(
        Rotation::NEVER, // Don't rotate during a single run
        &log_dir,
        &log_filename,
    );

    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bevy_ecs=info,bevy_app=info,boson=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    log_path_str
}

fn cleanup_old_logs(log_dir: &PathBuf, keep_count: usize) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| s.starts_with("boson") && s.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        // Oldest first
        log_files.sort_by_key(|e| e.metadata().ok().and_then(|m| m.modified().ok()));

        if log_files.len() > keep_count {
            for file in log_files.iter().take(log_files.len() - keep_count) {
                let _ = fs::remove_file(file.path());
            }
        }
    }
}

// ============================================================================
// Command Line
// ============================================================================

/// `boson [--map FILE] [--save FILE] [--ticks N]`
#[derive(Resource, Debug, Clone, Default)]
struct RunOptions {
    map: Option<String>,
    save: Option<String>,
    ticks: u64,
}

fn parse_args() -> RunOptions {
    let mut options = RunOptions { ticks: 200, ..default() };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--map" => options.map = args.next(),
            "--save" => options.save = args.next(),
            "--ticks" => match args.next().map(|n| n.parse::<u64>()) {
                Some(Ok(ticks)) => options.ticks = ticks,
                _ => eprintln!("--ticks expects a number, keeping {}", options.ticks),
            },
            other => eprintln!("Ignoring unknown argument {}", other),
        }
    }
    options
}

// ============================================================================
// Demo Map
// ============================================================================

/// A ridge-framed basin with a lake in the middle.
fn demo_map(width: u32, height: u32) -> MapData {
    let mut rng = rand::rng();
    let mut heights = HeightMap::flat(width, height, 4.0);
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let radius = width.min(height) as f32 / 4.0;
    for y in 0..=height as i32 {
        for x in 0..=width as i32 {
            let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt() / radius;
            let ground = 4.0 * d.min(1.5) - 1.0 + rng.random_range(-0.1..0.1);
            let _ = heights.set_corner_height(x, y, ground);
        }
    }
    let lake = LakeRecord {
        min_x: 0,
        min_y: 0,
        max_x: width as i32,
        max_y: height as i32,
        origin_x: cx as i32,
        origin_y: cy as i32,
        level: 1.5,
        surface_type: 1,
    };
    MapData::new(&heights, vec![lake])
}

fn spawn_demo_units(mut world: ResMut<GameWorld>) {
    let mut rng = rand::rng();
    let (w, h) = (world.width() as f32, world.height() as f32);
    if w < 2.0 || h < 2.0 {
        return;
    }
    let players = world.players().len().max(1) as u8;
    for i in 0..DEMO_UNITS {
        let owner = i as u8 % players;
        let position = FixedVec3::from_f32(rng.random_range(1.0..w - 1.0), rng.random_range(1.0..h - 1.0), 0.0);
        let unit = UnitState::new(owner).with_sight(rng.random_range(3..8));
        let size = FixedVec3::new(FixedNum::from_num(1), FixedNum::from_num(1), FixedNum::from_num(1));
        match world.spawn(SpatialItem::unit(unit, position, size)) {
            Ok(id) => {
                let velocity = FixedVec3::from_f32(rng.random_range(-0.2..0.2), rng.random_range(-0.2..0.2), 0.0);
                world.set_velocity(id, velocity);
            }
            Err(e) => error!("Failed to spawn demo unit: {}", e),
        }
    }
    info!("Spawned {} demo units", DEMO_UNITS);
}

/// Keep units on the map by reversing their velocity at the border.
fn bounce_units(mut world: ResMut<GameWorld>) {
    let max_x = FixedNum::from_num(world.width()) - FixedNum::ONE;
    let max_y = FixedNum::from_num(world.height()) - FixedNum::ONE;
    let turns: Vec<_> = world
        .index()
        .iter()
        .filter_map(|(id, item)| {
            let p = item.position();
            let mut v = item.velocity;
            if (p.x <= FixedNum::ONE && v.x < FixedNum::ZERO) || (p.x >= max_x && v.x > FixedNum::ZERO) {
                v.x = -v.x;
            }
            if (p.y <= FixedNum::ONE && v.y < FixedNum::ZERO) || (p.y >= max_y && v.y > FixedNum::ZERO) {
                v.y = -v.y;
            }
            (v != item.velocity).then_some((id, v))
        })
        .collect();
    for (id, velocity) in turns {
        world.set_velocity(id, velocity);
    }
}

fn finish_run(
    options: Res<RunOptions>,
    tick: Res<SimTick>,
    world: Res<GameWorld>,
    water: Res<WaterManager>,
    terrain: Res<Terrain>,
    view: Res<WaterView>,
    mut exit: MessageWriter<AppExit>,
) {
    if tick.0 < options.ticks {
        return;
    }
    for fog in world.players() {
        info!(
            "Player {}: {} explored, {} visible cells",
            fog.player(),
            fog.explored_count(),
            fog.unfogged_count()
        );
    }
    let stats = view.statistics();
    info!("Water: {} lakes, {} chunks, {} quads in view", stats.lakes, stats.chunks, stats.quads);

    if let Some(path) = &options.save {
        let data = MapData::new(&terrain.0, water.save_lakes());
        match save_map(path, &data) {
            Ok(()) => info!("Saved map to {}", path),
            Err(e) => error!("Failed to save map to {}: {}", path, e),
        }
        if let Some(fog) = world.players().first() {
            let fog_path = format!("{}.fog.ron", path);
            let written = ron::ser::to_string_pretty(&fog.save(), ron::ser::PrettyConfig::default())
                .map_err(|e| e.to_string())
                .and_then(|text| fs::write(&fog_path, text).map_err(|e| e.to_string()));
            if let Err(e) = written {
                error!("Failed to save fog to {}: {}", fog_path, e);
            }
        }
    }
    exit.write(AppExit::Success);
}

fn main() {
    let log_file = setup_file_logging();
    println!("Boson - logging to {}", log_file);

    let options = parse_args();
    let config = std::fs::read_to_string("assets/initial_config.ron")
        .ok()
        .and_then(|text| InitialConfig::from_ron(&text).ok())
        .unwrap_or_default();

    let data = match &options.map {
        Some(path) => match load_map(path) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to load map {}: {}, using demo map", path, e);
                demo_map(config.map_width, config.map_height)
            }
        },
        None => demo_map(config.map_width, config.map_height),
    };
    let setup = MapSetup {
        data: Some(data),
        players: vec![PlayerSetup::default(), PlayerSetup::default()],
    };

    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(1.0 / 60.0))))
        .add_plugins(AssetPlugin::default())
        .add_plugins(BosonPlugin)
        .insert_resource(setup)
        .insert_resource(options)
        .add_systems(PostStartup, spawn_demo_units)
        .add_systems(FixedUpdate, bounce_units.before(boson::game::simulation::SimSet::Movement))
        .add_systems(Update, finish_run)
        .run();
}
