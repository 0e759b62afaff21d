use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bevy::prelude::*;
use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};

use super::PlayerFog;
use crate::game::error::LoadError;

const LINE_WIDTH: usize = 76;

/// Persisted fog state of one player.
///
/// `Explored` holds the bit count (u32 LE) followed by the packed explored
/// bits, least significant bit first. `Fogged` holds one u16 LE reference
/// count per cell. Both are base64 text folded into lines.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FogRecord {
    #[serde(rename = "Explored", default, skip_serializing_if = "Option::is_none")]
    pub explored: Option<String>,
    #[serde(rename = "Fogged", default, skip_serializing_if = "Option::is_none")]
    pub fogged: Option<String>,
}

fn encode_folded(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut folded = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH + 1);
    for (i, ch) in encoded.chars().enumerate() {
        if i > 0 && i % LINE_WIDTH == 0 {
            folded.push('\n');
        }
        folded.push(ch);
    }
    folded
}

fn decode_folded(text: &str) -> Result<Vec<u8>, LoadError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}

fn pack_bits(bits: &FixedBitSet) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + bits.len().div_ceil(8));
    bytes.extend_from_slice(&(bits.len() as u32).to_le_bytes());
    let mut packed = vec![0u8; bits.len().div_ceil(8)];
    for index in bits.ones() {
        packed[index / 8] |= 1 << (index % 8);
    }
    bytes.extend_from_slice(&packed);
    bytes
}

fn unpack_bits(bytes: &[u8], expected: usize) -> Result<FixedBitSet, LoadError> {
    let Some((header, packed)) = bytes.split_first_chunk::<4>() else {
        return Err(LoadError::SizeMismatch { expected: 4, found: bytes.len() });
    };
    let len = u32::from_le_bytes(*header) as usize;
    if len != expected {
        return Err(LoadError::SizeMismatch { expected, found: len });
    }
    if packed.len() != len.div_ceil(8) {
        return Err(LoadError::SizeMismatch { expected: len.div_ceil(8), found: packed.len() });
    }
    let mut bits = FixedBitSet::with_capacity(len);
    for index in 0..len {
        if packed[index / 8] & (1 << (index % 8)) != 0 {
            bits.insert(index);
        }
    }
    Ok(bits)
}

fn unpack_refs(bytes: &[u8], expected: usize) -> Result<Vec<u16>, LoadError> {
    if bytes.len() != expected * 2 {
        return Err(LoadError::SizeMismatch { expected, found: bytes.len() / 2 });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

impl PlayerFog {
    pub fn save(&self) -> FogRecord {
        let refs: Vec<u8> = self.refs.iter().flat_map(|count| count.to_le_bytes()).collect();
        FogRecord {
            explored: Some(encode_folded(&pack_bits(&self.explored))),
            fogged: Some(encode_folded(&refs)),
        }
    }

    /// Restore fog state saved by [`PlayerFog::save`] for a map of the
    /// current dimensions.
    ///
    /// A record without `Explored` leaves the player with a fully explored
    /// map and reports [`LoadError::MissingTag`]; the caller may accept that
    /// default. Any other failure leaves the state untouched. No events are
    /// queued.
    pub fn load(&mut self, record: &FogRecord) -> Result<(), LoadError> {
        let cells = self.width as usize * self.height as usize;
        let Some(explored) = record.explored.as_deref() else {
            warn!("player {}: no Explored data, exploring the whole map", self.player);
            self.explored = FixedBitSet::with_capacity(cells);
            self.explored.insert_range(..);
            self.recount();
            return Err(LoadError::MissingTag("Explored"));
        };
        let explored = unpack_bits(&decode_folded(explored)?, cells)?;
        let fogged = record.fogged.as_deref().ok_or(LoadError::MissingTag("Fogged"))?;
        let refs = unpack_refs(&decode_folded(fogged)?, cells)?;

        self.explored = explored;
        self.refs = refs;
        self.recount();
        Ok(())
    }
}
