use std::fs::File;
use std::io::{BufReader, BufWriter};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use super::HeightMap;
use crate::game::error::LoadError;
use crate::game::water::LakeRecord;

pub const MAP_VERSION: u32 = 1;

/// Everything needed to rebuild the terrain and water of a map.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MapData {
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub heights: Vec<f32>,
    pub lakes: Vec<LakeRecord>,
}

impl MapData {
    pub fn new(heights: &HeightMap, lakes: Vec<LakeRecord>) -> Self {
        Self {
            version: MAP_VERSION,
            width: heights.width(),
            height: heights.height(),
            heights: heights.heights().to_vec(),
            lakes,
        }
    }

    pub fn height_map(&self) -> Result<HeightMap, LoadError> {
        HeightMap::from_heights(self.width, self.height, self.heights.clone())
    }
}

pub fn save_map(path: &str, map_data: &MapData) -> Result<(), LoadError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder = ZlibEncoder::new(writer, Compression::default());
    bincode::serialize_into(&mut encoder, map_data)?;
    encoder.finish()?;
    Ok(())
}

pub fn load_map(path: &str) -> Result<MapData, LoadError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut decoder = ZlibDecoder::new(reader);
    let map_data: MapData = bincode::deserialize_from(&mut decoder)?;
    if map_data.version != MAP_VERSION {
        return Err(LoadError::VersionMismatch { expected: MAP_VERSION, found: map_data.version });
    }
    Ok(map_data)
}
