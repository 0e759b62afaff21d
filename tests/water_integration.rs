use boson::game::config::InitialConfig;
use boson::game::fixed_math::{FixedNum, FixedVec3};
use boson::game::map::{load_map, save_map, CellGrid, HeightMap, MapData};
use boson::game::simulation::{build_world, MapSetup, PlayerSetup};
use boson::game::spatial::{ItemKind, SpatialIndex, SpatialItem, UnitState};
use boson::game::water::{LakeRecord, WaterManager, WaterParams};

/// Rolling terrain with a few random dips.
fn random_terrain(seed: u64, width: u32, height: u32) -> HeightMap {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut heights = HeightMap::flat(width, height, 3.0);
    for _ in 0..6 {
        let (cx, cy) = (rng.i32(0..=width as i32), rng.i32(0..=height as i32));
        let radius = rng.i32(3..10);
        for y in 0..=height as i32 {
            for x in 0..=width as i32 {
                let d = (((x - cx).pow(2) + (y - cy).pow(2)) as f32).sqrt();
                if d < radius as f32 {
                    let current = heights.corner_height(x, y).unwrap();
                    let _ = heights.set_corner_height(x, y, current.min(d / radius as f32 * 3.0 - 1.0));
                }
            }
        }
    }
    heights
}

fn deepest_corner(heights: &HeightMap) -> (i32, i32) {
    let mut best = (0, 0, f32::MAX);
    for y in 0..=heights.height() as i32 {
        for x in 0..=heights.width() as i32 {
            let h = heights.corner_height(x, y).unwrap();
            if h < best.2 {
                best = (x, y, h);
            }
        }
    }
    (best.0, best.1)
}

fn whole_map_lake(heights: &HeightMap, level: f32) -> LakeRecord {
    let (origin_x, origin_y) = deepest_corner(heights);
    LakeRecord {
        min_x: 0,
        min_y: 0,
        max_x: heights.width() as i32,
        max_y: heights.height() as i32,
        origin_x,
        origin_y,
        level,
        surface_type: 1,
    }
}

fn load(heights: &HeightMap, chunk_size: i32, level: f32) -> WaterManager {
    let params = WaterParams { chunk_size, ..WaterParams::default() };
    let mut water = WaterManager::new(heights.width(), heights.height(), params);
    water.load_lakes(&[whole_map_lake(heights, level)], heights).unwrap();
    water
}

#[test]
fn test_flood_fill_is_deterministic() {
    for seed in [1, 2, 3] {
        let heights = random_terrain(seed, 48, 40);
        let a = load(&heights, 10, 0.5);
        let b = load(&heights, 10, 0.5);

        assert_eq!(a.underwater_mask(), b.underwater_mask());
        for (la, lb) in a.lakes().iter().zip(b.lakes()) {
            assert_eq!(la.bounds(), lb.bounds());
            assert_eq!(la.fill_count(), lb.fill_count());
            assert_eq!(la.corner_bits(), lb.corner_bits());
            assert_eq!(la.chunks().len(), lb.chunks().len());
        }
    }
}

#[test]
fn test_chunks_cover_every_lake_corner() {
    for (seed, chunk_size) in [(4, 4), (5, 7), (6, 10)] {
        let heights = random_terrain(seed, 40, 40);
        let water = load(&heights, chunk_size, 1.0);
        let lake = &water.lakes()[0];
        let (min_x, min_y, max_x, max_y) = lake.bounds();

        // Walk the same partition the lake uses; chunks come in block order
        // and blocks with fewer than four corners are dropped.
        let mut chunks = lake.chunks().iter();
        let mut cy = min_y;
        while cy < max_y {
            let mut cx = min_x;
            while cx < max_x {
                let (x2, y2) = ((cx + chunk_size).min(max_x), (cy + chunk_size).min(max_y));
                let members: Vec<(i32, i32)> = (cy..=y2)
                    .flat_map(|y| (cx..=x2).map(move |x| (x, y)))
                    .filter(|&(x, y)| lake.has_corner(x, y))
                    .collect();
                if members.len() >= 4 {
                    let chunk = chunks.next().expect("block without chunk");
                    assert_eq!(chunk.corner_count, members.len());
                    assert!(members
                        .iter()
                        .all(|&(x, y)| x >= chunk.min_x && x <= chunk.max_x && y >= chunk.min_y && y <= chunk.max_y));
                }
                cx += chunk_size;
            }
            cy += chunk_size;
        }
        assert!(chunks.next().is_none());

        for chunk in lake.chunks() {
            assert!(chunk.max_x - chunk.min_x <= chunk_size);
            assert!(chunk.max_y - chunk.min_y <= chunk_size);
            assert!(chunk.min_ground <= chunk.max_ground);
        }
    }
}

#[test]
fn test_map_round_trip_rebuilds_water() {
    let heights = random_terrain(9, 32, 32);
    let data = MapData::new(&heights, vec![whole_map_lake(&heights, 0.5)]);
    let setup = MapSetup { data: None, players: vec![PlayerSetup::default(); 2] };
    let config = InitialConfig::default();

    let path = std::env::temp_dir().join(format!("boson_water_{}.map", std::process::id()));
    let path = path.to_string_lossy().to_string();
    save_map(&path, &data).unwrap();
    let loaded = load_map(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let (_, world_a, water_a) = build_world(&config, &data, &setup).unwrap();
    let (terrain_b, world_b, water_b) = build_world(&config, &loaded, &setup).unwrap();

    assert_eq!(terrain_b.0, heights);
    assert_eq!(world_b.players().len(), 2);
    assert_eq!(water_a.underwater_mask(), water_b.underwater_mask());
    assert_eq!(water_b.save_lakes(), data.lakes);

    // Water marks the same cells on both grids.
    let water_cells = |grid: &CellGrid| grid.iter().filter(|(_, cell)| cell.is_water).count();
    assert_eq!(water_cells(world_a.index().grid()), water_cells(world_b.index().grid()));
    assert!(water_cells(world_b.index().grid()) > 0);
}

#[test]
fn test_broken_lake_does_not_fail_the_map() {
    let heights = HeightMap::flat(8, 8, 0.0);
    let bad = LakeRecord {
        min_x: 0,
        min_y: 0,
        max_x: 2,
        max_y: 2,
        origin_x: 6,
        origin_y: 6,
        level: 1.0,
        surface_type: 0,
    };
    let data = MapData::new(&heights, vec![bad]);
    let (_, _, water) = build_world(&InitialConfig::default(), &data, &MapSetup::default()).unwrap();
    assert!(water.lakes().is_empty());

    let mut short = data.clone();
    short.heights.pop();
    assert!(build_world(&InitialConfig::default(), &short, &MapSetup::default()).is_err());
}

#[test]
fn test_collision_is_symmetric_on_exact_boxes() {
    let mut rng = fastrand::Rng::with_seed(1234);
    let mut index = SpatialIndex::new(64, 64);
    let quarter = |n: u32| FixedNum::from_num(n) / FixedNum::from_num(4);

    let ids: Vec<_> = (0..80)
        .map(|_| {
            let position = FixedVec3::new(quarter(rng.u32(8..120)), quarter(rng.u32(8..120)), FixedNum::ZERO);
            let side = quarter(rng.u32(1..8) * 2);
            let size = FixedVec3::new(side, side, FixedNum::ONE);
            index.spawn(SpatialItem::new(ItemKind::Unit(UnitState::new(0)), position, size))
        })
        .collect();

    let mut hits = 0;
    for &a in &ids {
        for &b in &ids {
            if a == b {
                continue;
            }
            let ab = index.items_collide(a, b);
            assert_eq!(ab, index.items_collide(b, a));
            hits += usize::from(ab);
        }
    }
    assert!(hits > 0, "Some boxes should overlap");
}
