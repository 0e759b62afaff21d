use bevy::prelude::*;

use crate::game::error::FogError;
use crate::game::fixed_math::{FixedNum, FixedVec3};
use crate::game::fog::{update_visible_status, FogEvent, PlayerFog, SightManager};
use crate::game::spatial::{ItemId, PlayerId, SpatialIndex, SpatialItem};

/// Simulation state of one game session: items, their cell membership and
/// every player's fog of war.
///
/// All geometry changes go through this type so that cell membership, sight
/// refs and unit visibility are updated in the same order on every client:
/// cells are retracted, geometry changes, cells are re-added, then the
/// sight circle and visibility are refreshed.
#[derive(Resource, Debug, Clone)]
pub struct GameWorld {
    index: SpatialIndex,
    players: Vec<PlayerFog>,
    sight: SightManager,
}

impl Default for GameWorld {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl GameWorld {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            index: SpatialIndex::new(width, height),
            players: Vec::new(),
            sight: SightManager::default(),
        }
    }

    pub fn width(&self) -> u32 {
        self.index.grid().width()
    }

    pub fn height(&self) -> u32 {
        self.index.grid().height()
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Per-cell map state (water, move cost) for map initialization.
    pub fn index_mut(&mut self) -> &mut SpatialIndex {
        &mut self.index
    }

    pub fn players(&self) -> &[PlayerFog] {
        &self.players
    }

    pub fn player(&self, player: PlayerId) -> Option<&PlayerFog> {
        self.players.get(player as usize)
    }

    pub fn sight(&self) -> &SightManager {
        &self.sight
    }

    /// Register a player and initialize their fog map. Ids are assigned in order.
    pub fn add_player(&mut self, active: bool, unexplored: bool, fogged: bool) -> PlayerId {
        let id = self.players.len() as PlayerId;
        let mut fog = PlayerFog::new(id, active);
        fog.init_map(self.width(), self.height(), unexplored, fogged);
        self.players.push(fog);
        id
    }

    pub fn spawn(&mut self, item: SpatialItem) -> Result<ItemId, FogError> {
        let id = self.index.spawn(item);
        self.sight.add_sight(&mut self.index, &mut self.players, id)?;
        update_visible_status(&mut self.index, &mut self.players, id);
        Ok(id)
    }

    pub fn despawn(&mut self, id: ItemId) -> Result<Option<SpatialItem>, FogError> {
        self.sight.remove_sight(&mut self.index, &mut self.players, id)?;
        Ok(self.index.despawn(id))
    }

    /// Mark a unit destroyed and release its sight. It stays in its cells
    /// (as a wreck) until despawned.
    pub fn destroy_unit(&mut self, id: ItemId) -> Result<(), FogError> {
        if let Some(unit) = self.index.unit_mut(id) {
            unit.destroyed = true;
            unit.moving = false;
        }
        self.sight.remove_sight(&mut self.index, &mut self.players, id)
    }

    pub fn set_velocity(&mut self, id: ItemId, velocity: FixedVec3) {
        if let Some(item) = self.index.get_mut(id) {
            item.velocity = velocity;
            if let Some(unit) = item.kind.as_unit_mut() {
                unit.moving = !velocity.is_zero();
            }
        }
    }

    pub fn move_by(&mut self, id: ItemId, delta: FixedVec3) -> Result<bool, FogError> {
        if !self.index.move_by(id, delta) {
            return Ok(false);
        }
        self.sight.update_sight(&mut self.index, &mut self.players, id)?;
        Ok(true)
    }

    pub fn move_to(&mut self, id: ItemId, position: FixedVec3) -> Result<bool, FogError> {
        if !self.index.move_to(id, position) {
            return Ok(false);
        }
        self.sight.update_sight(&mut self.index, &mut self.players, id)?;
        Ok(true)
    }

    pub fn set_size(
        &mut self,
        id: ItemId,
        width: FixedNum,
        height: FixedNum,
        depth: FixedNum,
    ) -> Result<bool, FogError> {
        if !self.index.set_size(id, width, height, depth) {
            return Ok(false);
        }
        self.sight.update_sight(&mut self.index, &mut self.players, id)?;
        Ok(true)
    }

    /// One simulation step: move every moving, living unit by its velocity,
    /// in id order. Returns the number of units moved.
    pub fn advance(&mut self) -> Result<usize, FogError> {
        let movers: Vec<(ItemId, FixedVec3)> = self
            .index
            .iter()
            .filter(|(_, item)| {
                item.kind.as_unit().is_some_and(|unit| unit.moving && !unit.destroyed)
                    && !item.velocity.is_zero()
            })
            .map(|(id, item)| (id, item.velocity))
            .collect();

        for &(id, velocity) in &movers {
            self.move_by(id, velocity)?;
        }
        Ok(movers.len())
    }

    /// Add a scripted fog ref (e.g. a reveal effect) for a player.
    pub fn add_fog_ref(&mut self, player: PlayerId, x: i32, y: i32) -> Result<(), FogError> {
        let fog = self.players.get_mut(player as usize).ok_or(FogError::UnknownPlayer(player))?;
        fog.add_fog_ref(x, y, &mut self.index)
    }

    pub fn remove_fog_ref(&mut self, player: PlayerId, x: i32, y: i32) -> Result<(), FogError> {
        let fog = self.players.get_mut(player as usize).ok_or(FogError::UnknownPlayer(player))?;
        fog.remove_fog_ref(x, y, &mut self.index)
    }

    pub fn explore(&mut self, player: PlayerId, x: i32, y: i32) -> Result<(), FogError> {
        Ok(self.player_fog_mut(player)?.explore(x, y)?)
    }

    pub fn unexplore(&mut self, player: PlayerId, x: i32, y: i32) -> Result<(), FogError> {
        Ok(self.player_fog_mut(player)?.unexplore(x, y)?)
    }

    /// Whether `player` currently sees the item.
    pub fn can_see(&self, player: PlayerId, id: ItemId) -> bool {
        self.player(player).is_some_and(|fog| fog.can_see(&self.index, id))
    }

    /// Take the queued fog events of every player, in player order.
    pub fn drain_events(&mut self) -> Vec<FogEvent> {
        self.players.iter_mut().flat_map(PlayerFog::drain_events).collect()
    }

    fn player_fog_mut(&mut self, player: PlayerId) -> Result<&mut PlayerFog, FogError> {
        self.players.get_mut(player as usize).ok_or(FogError::UnknownPlayer(player))
    }
}
