use bevy::prelude::*;
use fixedbitset::FixedBitSet;
use smallvec::SmallVec;

use super::lake::{Lake, LakeRecord, SurfaceType, WaveState};
use super::{WaterParams, WATER_TIME_OFFSET};
use crate::game::config::WaterSettings;
use crate::game::error::{GridError, LoadError};
use crate::game::map::{CellGrid, GroundHeight};

/// Cells deeper than this on average cannot be crossed by ground units.
const PASSABLE_DEPTH: f32 = 0.2;
/// Cells whose corners are all lake corners deeper than this block sight.
const OPAQUE_DEPTH: f32 = 2.0;

// ============================================================================
// Corner Mask
// ============================================================================

/// One bit per map corner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CornerMask {
    width: u32,
    height: u32,
    bits: FixedBitSet,
}

impl CornerMask {
    /// Mask for a `width x height` cell map, i.e. `(width + 1) x (height + 1)` corners.
    pub fn for_map(width: u32, height: u32) -> Self {
        let (width, height) = (width + 1, height + 1);
        Self { width, height, bits: FixedBitSet::with_capacity(width as usize * height as usize) }
    }

    /// Width in corners.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in corners.
    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    /// `false` outside the map.
    pub fn get(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some_and(|index| self.bits.contains(index))
    }

    /// Ignored outside the map.
    pub fn set(&mut self, x: i32, y: i32, value: bool) {
        if let Some(index) = self.index(x, y) {
            self.bits.set(index, value);
        }
    }

    pub fn try_get(&self, x: i32, y: i32) -> Result<bool, GridError> {
        self.index(x, y)
            .map(|index| self.bits.contains(index))
            .ok_or(GridError::OutOfRange { x, y, width: self.width, height: self.height })
    }

    pub fn count(&self) -> usize {
        self.bits.count_ones(..)
    }
}

// ============================================================================
// Render Capabilities
// ============================================================================

/// Graphics features available to the water renderer, queried once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderCapabilities {
    pub multitexture: bool,
    pub texture_env_combine: bool,
    pub texture_env_dot3: bool,
    pub blend_color: bool,
    pub blend_color_ext: bool,
    pub cube_map: bool,
    pub vertex_buffer_object: bool,
}

impl Default for RenderCapabilities {
    fn default() -> Self {
        Self {
            multitexture: true,
            texture_env_combine: true,
            texture_env_dot3: true,
            blend_color: true,
            blend_color_ext: true,
            cube_map: true,
            vertex_buffer_object: true,
        }
    }
}

impl RenderCapabilities {
    /// Fixed-function baseline without any extension.
    pub fn none() -> Self {
        Self {
            multitexture: false,
            texture_env_combine: false,
            texture_env_dot3: false,
            blend_color: false,
            blend_color_ext: false,
            cube_map: false,
            vertex_buffer_object: false,
        }
    }

    pub fn supports_reflections(&self) -> bool {
        self.multitexture && self.texture_env_combine && self.cube_map
    }

    pub fn supports_bumpmapping(&self) -> bool {
        self.multitexture
            && self.texture_env_combine
            && self.texture_env_dot3
            && (self.blend_color || self.blend_color_ext)
    }

    pub fn supports_translucency(&self) -> bool {
        self.multitexture && self.texture_env_combine
    }

    /// Turn off requested features the hardware lacks. Returns the restricted
    /// settings and the names of the features that were turned off.
    pub fn restrict(&self, mut settings: WaterSettings) -> (WaterSettings, Vec<&'static str>) {
        let mut disabled = Vec::new();
        if settings.reflections && !self.supports_reflections() {
            settings.reflections = false;
            disabled.push("reflections");
        }
        if settings.bumpmapping && !self.supports_bumpmapping() {
            settings.bumpmapping = false;
            disabled.push("bumpmapping");
        }
        if settings.translucency && !self.supports_translucency() {
            settings.translucency = false;
            disabled.push("translucency");
        }
        (settings, disabled)
    }
}

// ============================================================================
// Water Manager
// ============================================================================

/// All lakes of the current map plus the per-corner underwater state.
#[derive(Resource, Debug, Clone)]
pub struct WaterManager {
    width: u32,
    height: u32,
    underwater: CornerMask,
    pub(crate) lakes: Vec<Lake>,
    params: WaterParams,
    requested: WaterSettings,
    settings: WaterSettings,
    capabilities: Option<RenderCapabilities>,
    textures_dirty: bool,
    elapsed: f32,
    dirty: bool,
    passable: FixedBitSet,
    visible: FixedBitSet,
}

impl Default for WaterManager {
    fn default() -> Self {
        Self::new(0, 0, WaterParams::default())
    }
}

impl WaterManager {
    pub fn new(width: u32, height: u32, params: WaterParams) -> Self {
        let cells = width as usize * height as usize;
        let mut passable = FixedBitSet::with_capacity(cells);
        passable.insert_range(..);
        let visible = passable.clone();
        Self {
            width,
            height,
            underwater: CornerMask::for_map(width, height),
            lakes: Vec::new(),
            params,
            requested: WaterSettings::default(),
            settings: WaterSettings::default(),
            capabilities: None,
            textures_dirty: true,
            elapsed: 0.0,
            dirty: true,
            passable,
            visible,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn params(&self) -> &WaterParams {
        &self.params
    }

    pub fn lakes(&self) -> &[Lake] {
        &self.lakes
    }

    pub fn settings(&self) -> WaterSettings {
        self.settings
    }

    pub fn capabilities(&self) -> Option<RenderCapabilities> {
        self.capabilities
    }

    pub fn underwater_mask(&self) -> &CornerMask {
        &self.underwater
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether textures must be reloaded since the last call.
    pub fn take_textures_dirty(&mut self) -> bool {
        std::mem::take(&mut self.textures_dirty)
    }

    /// Seconds of water animation since the map was loaded.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Water clock, offset so waves on a fresh map are not all in phase.
    pub fn time(&self) -> f32 {
        WATER_TIME_OFFSET + self.elapsed
    }

    pub fn wave_state(&self) -> WaveState {
        WaveState { enabled: self.settings.waves, time: self.time() }
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Create and flood fill every lake of `records`, in order.
    ///
    /// Invalid records and lakes that fail to flood fill are skipped; the
    /// remaining lakes are kept and the first error is returned.
    pub fn load_lakes(&mut self, records: &[LakeRecord], heights: &impl GroundHeight) -> Result<(), LoadError> {
        let mut first_error = None;
        for record in records {
            let result = Lake::from_record(record, self.params.appearance).and_then(|lake| {
                if self.add_lake(lake, heights) {
                    Ok(())
                } else {
                    Err(LoadError::LakeRejected { x: record.origin_x, y: record.origin_y })
                }
            });
            if let Err(err) = result {
                error!("failed to load lake: {}", err);
                first_error.get_or_insert(err);
            }
        }
        info!("loaded {} lakes ({} corners underwater)", self.lakes.len(), self.underwater.count());
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Flood fill a lake and keep it if it is valid.
    pub fn add_lake(&mut self, mut lake: Lake, heights: &impl GroundHeight) -> bool {
        let origin = lake.origin();
        if self.underwater.get(origin.x, origin.y) {
            warn!("lake origin ({}, {}) is already underwater", origin.x, origin.y);
        }
        if !lake.find_water(&mut self.underwater, heights, self.params.chunk_size, self.params.max_lake_corners) {
            return false;
        }
        self.lakes.push(lake);
        self.dirty = true;
        true
    }

    /// Records of all lakes, each holding its loaded search area.
    pub fn save_lakes(&self) -> Vec<LakeRecord> {
        self.lakes.iter().map(Lake::to_record).collect()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn is_underwater(&self, x: i32, y: i32) -> Result<bool, GridError> {
        self.underwater.try_get(x, y)
    }

    /// Depth of still water above corner `(x, y)`, 0 if the corner is dry.
    pub fn water_depth(&self, x: i32, y: i32, heights: &impl GroundHeight) -> Result<f32, GridError> {
        if !self.underwater.try_get(x, y)? {
            return Ok(0.0);
        }
        let ground = heights.ground_height(x, y);
        Ok(self
            .lakes
            .iter()
            .find(|lake| lake.has_corner(x, y))
            .map(|lake| (lake.level - ground).max(0.0))
            .unwrap_or(0.0))
    }

    fn cell_index(&self, x: i32, y: i32) -> Result<usize, GridError> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return Err(GridError::OutOfRange { x, y, width: self.width, height: self.height });
        }
        Ok(y as usize * self.width as usize + x as usize)
    }

    pub fn is_cell_passable(&self, x: i32, y: i32) -> Result<bool, GridError> {
        Ok(self.passable.contains(self.cell_index(x, y)?))
    }

    /// `false` for cells under deep water, which block sight.
    pub fn is_cell_visible(&self, x: i32, y: i32) -> Result<bool, GridError> {
        Ok(self.visible.contains(self.cell_index(x, y)?))
    }

    /// Mark water cells on the map grid and compute passability/visibility.
    ///
    /// A cell is water if any of its four corners belongs to a lake. Depths
    /// (`level - ground`, unclamped) are taken only at the corners the lake
    /// owns: the cell is impassable (move cost 255) when their average
    /// exceeds 0.2, and blocks sight when the lake owns all four corners and
    /// the shallowest is deeper than 2.0.
    pub fn init_cell_maps(&mut self, grid: &mut CellGrid, heights: &impl GroundHeight) {
        let (width, height) = (self.width as i32, self.height as i32);
        let cell_count = self.width as usize * self.height as usize;
        self.passable.insert_range(..cell_count);
        self.visible.insert_range(..cell_count);

        let mut impassable = 0;
        for lake in &self.lakes {
            let (min_x, min_y, max_x, max_y) = lake.bounds();
            for y in min_y.max(0)..max_y.min(height) {
                for x in min_x.max(0)..max_x.min(width) {
                    let depths: SmallVec<[f32; 4]> = [(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)]
                        .into_iter()
                        .filter(|&(cx, cy)| lake.has_corner(cx, cy))
                        .map(|(cx, cy)| lake.level - heights.ground_height(cx, cy))
                        .collect();
                    if depths.is_empty() {
                        continue;
                    }

                    let average = depths.iter().sum::<f32>() / depths.len() as f32;
                    let shallowest = depths.iter().copied().fold(f32::MAX, f32::min);
                    let index = y as usize * self.width as usize + x as usize;
                    if depths.len() == 4 && shallowest > OPAQUE_DEPTH {
                        self.visible.set(index, false);
                    }

                    let Ok(cell) = grid.cell_mut(x, y) else { continue };
                    cell.is_water = true;
                    if average > PASSABLE_DEPTH && self.passable.contains(index) {
                        self.passable.set(index, false);
                        cell.move_cost = u8::MAX;
                        impassable += 1;
                    }
                }
            }
        }
        debug!("water cell maps: {} impassable cells", impassable);
    }

    // ------------------------------------------------------------------------
    // Time & Configuration
    // ------------------------------------------------------------------------

    /// Advance the water clock.
    ///
    /// With reflections on, index buffers skip cells the viewer cannot see,
    /// so every chunk is rebuilt to follow the current fog. Otherwise only
    /// wavy lakes need new geometry.
    pub fn update(&mut self, elapsed: f32) {
        self.elapsed += elapsed;
        if self.settings.reflections {
            self.set_dirty(true);
            return;
        }
        if !self.settings.waves {
            return;
        }
        for lake in self.lakes.iter_mut().filter(|lake| lake.surface == SurfaceType::Waves) {
            for chunk in &mut lake.chunks {
                chunk.dirty = true;
            }
            self.dirty = true;
        }
    }

    /// Set the global dirty flag; `true` also marks every chunk dirty.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
        if dirty {
            for chunk in self.lakes.iter_mut().flat_map(|lake| lake.chunks.iter_mut()) {
                chunk.dirty = true;
            }
        }
    }

    /// Detect graphics capabilities once and downgrade unsupported features.
    pub fn init_render(&mut self, capabilities: RenderCapabilities) {
        let (_, disabled) = capabilities.restrict(self.requested);
        for feature in disabled {
            warn!("water {} not supported by the renderer, disabling", feature);
        }
        self.capabilities = Some(capabilities);
        self.reload_configuration(self.requested);
    }

    /// Apply new settings, invalidating only what the changed flags affect.
    ///
    /// Reflection and animated bumpmap changes need new textures; reflection
    /// changes also affect tessellation and fog culling. Bumpmapping needs
    /// new textures and new buffers; translucency and waves need new buffers.
    pub fn reload_configuration(&mut self, requested: WaterSettings) {
        self.requested = requested;
        let new = match self.capabilities {
            Some(capabilities) => capabilities.restrict(requested).0,
            None => requested,
        };
        let old = self.settings;
        self.settings = new;

        let mut config_dirty = false;
        if new.reflections != old.reflections || new.animated_bumpmaps != old.animated_bumpmaps {
            self.textures_dirty = true;
        }
        if new.bumpmapping != old.bumpmapping {
            self.textures_dirty = true;
            config_dirty = true;
        }
        if new.translucency != old.translucency
            || new.waves != old.waves
            || new.derived_wave_normals != old.derived_wave_normals
        {
            config_dirty = true;
        }

        if config_dirty {
            for chunk in self.lakes.iter_mut().flat_map(|lake| lake.chunks.iter_mut()) {
                chunk.free_geometry();
            }
            self.dirty = true;
        } else if new.reflections != old.reflections {
            self.set_dirty(true);
        }
        if new != old {
            info!("water settings: {:?}", new);
        }
    }
}
