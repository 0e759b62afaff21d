/// Messages published by the simulation.
///
/// Fog state changes are queued inside the game world while it updates and
/// forwarded here once per tick, in the order they happened.

use bevy::prelude::*;

use crate::game::fog::FogEvent;
use crate::game::spatial::{ItemId, PlayerId, VisibleStatus};

// ============================================================================
// Fog Messages
// ============================================================================

/// A cell became visible (`fogged == false`) or fell back under fog.
#[derive(Event, Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellFogChanged {
    pub player: PlayerId,
    pub x: i32,
    pub y: i32,
    pub fogged: bool,
}

/// A cell was explored or reset to unexplored.
#[derive(Event, Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellExploredChanged {
    pub player: PlayerId,
    pub x: i32,
    pub y: i32,
    pub explored: bool,
}

/// The visibility of a unit to a player changed.
#[derive(Event, Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitVisibilityChanged {
    pub player: PlayerId,
    pub unit: ItemId,
    pub status: VisibleStatus,
}

/// Split a queued fog event into its message.
pub enum FogMessage {
    Fog(CellFogChanged),
    Explored(CellExploredChanged),
    Visibility(UnitVisibilityChanged),
}

impl From<FogEvent> for FogMessage {
    fn from(event: FogEvent) -> Self {
        match event {
            FogEvent::Fogged { player, x, y } => FogMessage::Fog(CellFogChanged { player, x, y, fogged: true }),
            FogEvent::Unfogged { player, x, y } => FogMessage::Fog(CellFogChanged { player, x, y, fogged: false }),
            FogEvent::Explored { player, x, y } => {
                FogMessage::Explored(CellExploredChanged { player, x, y, explored: true })
            }
            FogEvent::Unexplored { player, x, y } => {
                FogMessage::Explored(CellExploredChanged { player, x, y, explored: false })
            }
            FogEvent::UnitVisibilityChanged { player, unit, status } => {
                FogMessage::Visibility(UnitVisibilityChanged { player, unit, status })
            }
        }
    }
}
