use bevy::prelude::*;

use super::chunk::{ChunkGeometry, WaterChunk};
use super::frustum::Frustum;
use super::lake::{Lake, SurfaceType, WaveState};
use super::manager::WaterManager;
use crate::game::config::WaterSettings;
use crate::game::fog::PlayerFog;
use crate::game::map::GroundHeight;

/// Tessellation step used for every visible chunk.
const CHUNK_DETAIL: f32 = 1.0;
/// Step large enough to collapse a chunk into a single quad.
const SINGLE_QUAD_DETAIL: f32 = 1000.0;
/// Texture coordinate scroll per second of water time.
const TEXTURE_SCROLL: f32 = 0.04;
/// Averaged normals shorter than this (squared) are replaced by +Z.
const MIN_NORMAL_LENGTH_SQ: f32 = 0.05;
/// Z of corners that have no water around them.
const HIDDEN_VERTEX_Z: f32 = 10.0;

/// Camera, sun and view volume for one frame of water rendering.
#[derive(Resource, Debug, Clone, Copy)]
pub struct RenderEnvironment {
    pub camera_position: Vec3,
    pub sun_position: Vec3,
    pub frustum: Frustum,
}

impl Default for RenderEnvironment {
    fn default() -> Self {
        Self {
            camera_position: Vec3::new(0.0, 0.0, 50.0),
            sun_position: Vec3::new(0.0, 0.0, 1.0),
            frustum: Frustum::everything(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStatistics {
    pub lakes: u32,
    pub chunks: u32,
    pub quads: u32,
}

/// How a rendered chunk has to be drawn. Geometry lives in the chunk itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkDraw {
    pub lake: usize,
    pub chunk: usize,
    pub flat: bool,
    /// Alpha shared by the whole chunk, if known without per-corner data.
    pub const_alpha: Option<f32>,
    pub use_derivations: bool,
    pub single_quad: bool,
    pub bumpmapping: bool,
    pub reflections: bool,
    pub blended: bool,
    pub texture_offset: f32,
    pub quads: usize,
}

/// Per-frame inputs shared by all chunks.
struct FrameContext<'a, H> {
    heights: &'a H,
    settings: WaterSettings,
    waves: WaveState,
    texture_repeat: f32,
    texture_offset: f32,
    camera: Vec3,
    light: Vec3,
    fog: Option<&'a PlayerFog>,
}

/// Tessellation layout of one chunk.
#[derive(Debug, Clone, Copy)]
struct ChunkLayout {
    detail: f32,
    flat: bool,
    use_derivations: bool,
    border_left: usize,
    border_top: usize,
    cell_min_x: f32,
    cell_min_y: f32,
    cell_max_x: f32,
    cell_max_y: f32,
    cells_w: usize,
    cells_h: usize,
    corners_w: usize,
    corners_h: usize,
}

/// Builds and caches water geometry for the chunks in view.
#[derive(Debug, Default)]
pub struct WaterRenderer {
    stats: RenderStatistics,
    last_camera: Option<Vec3>,
    last_sun: Option<Vec3>,
}

impl WaterRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters of the last [`WaterRenderer::render`] call.
    pub fn statistics(&self) -> RenderStatistics {
        self.stats
    }

    /// Cull lakes and chunks against the frustum and rebuild the geometry of
    /// the visible dirty chunks. With reflections enabled, quads on cells the
    /// local player has fogged are skipped.
    pub fn render(
        &mut self,
        manager: &mut WaterManager,
        heights: &impl GroundHeight,
        env: &RenderEnvironment,
        local_fog: Option<&PlayerFog>,
    ) -> Vec<ChunkDraw> {
        self.stats = RenderStatistics::default();
        let settings = manager.settings();

        // Half vectors depend on the eye and the light.
        let moved = self.last_camera != Some(env.camera_position) || self.last_sun != Some(env.sun_position);
        if settings.bumpmapping && moved {
            manager.set_dirty(true);
        }
        self.last_camera = Some(env.camera_position);
        self.last_sun = Some(env.sun_position);

        let ctx = FrameContext {
            heights,
            settings,
            waves: manager.wave_state(),
            texture_repeat: manager.params().texture_repeat,
            texture_offset: manager.elapsed() * TEXTURE_SCROLL,
            camera: env.camera_position,
            light: env.sun_position.normalize_or(Vec3::Z),
            fog: local_fog,
        };
        let chunk_radius = manager.params().chunk_size as f32 / 2.0 * 1.414;

        let mut draws = Vec::new();
        for (lake_index, lake) in manager.lakes.iter_mut().enumerate() {
            if env.frustum.sphere_in_frustum(lake.center(), lake.radius()) == 0.0 {
                continue;
            }
            let wave_max = lake.appearance.wave_height_max;
            let lake_min = Vec3::new(lake.min_x as f32, -(lake.max_y as f32), lake.level - wave_max);
            let lake_max = Vec3::new(lake.max_x as f32, -(lake.min_y as f32), lake.level + wave_max);
            if !env.frustum.box_in_frustum(lake_min, lake_max) {
                continue;
            }

            let mut chunks = std::mem::take(&mut lake.chunks);
            for (chunk_index, chunk) in chunks.iter_mut().enumerate() {
                if env.frustum.sphere_in_frustum(chunk.center, chunk_radius) == 0.0 {
                    continue;
                }
                let chunk_min = Vec3::new(chunk.min_x as f32, -(chunk.max_y as f32), lake.level - wave_max);
                let chunk_max = Vec3::new(chunk.max_x as f32, -(chunk.min_y as f32), lake.level + wave_max);
                if !env.frustum.box_in_frustum(chunk_min, chunk_max) {
                    continue;
                }
                let mut draw = render_chunk(&ctx, lake, chunk, CHUNK_DETAIL);
                draw.lake = lake_index;
                draw.chunk = chunk_index;
                self.stats.chunks += 1;
                self.stats.quads += draw.quads as u32;
                draws.push(draw);
            }
            lake.chunks = chunks;
            self.stats.lakes += 1;
        }

        manager.set_dirty(false);
        draws
    }
}

/// Alpha of the whole chunk when it can be decided from the chunk's ground
/// range alone.
fn chunk_const_alpha<H: GroundHeight>(ctx: &FrameContext<'_, H>, lake: &Lake, chunk: &WaterChunk, flat: bool) -> Option<f32> {
    if !ctx.settings.translucency {
        return Some(1.0);
    }
    let a = &lake.appearance;
    let opaque = |surface_min: f32| {
        let depth = surface_min - chunk.max_ground;
        depth > 0.0 && depth * a.alpha_multiplier + a.alpha_base >= 1.0
    };
    if flat {
        if chunk.min_ground == chunk.max_ground {
            return Some(lake.alpha_at(chunk.min_x as f32, chunk.min_y as f32, ctx.heights, ctx.waves));
        }
        if opaque(lake.level) {
            return Some(1.0);
        }
    } else if lake.surface == SurfaceType::Waves && opaque(lake.level - a.wave_height_max) {
        return Some(1.0);
    }
    None
}

/// Cell range `[min, max]` of a chunk axis, widened by one step on each
/// side where the lake continues so averaged normals match across seams.
fn chunk_borders(chunk_min: i32, chunk_max: i32, lake_min: i32, lake_max: i32, detail: f32) -> (f32, f32) {
    let cell_min = (chunk_min as f32 - detail).max(lake_min as f32);
    let cell_max = (chunk_max as f32 + detail).min(lake_max as f32);
    (cell_min, cell_max)
}

fn chunk_layout<H: GroundHeight>(ctx: &FrameContext<'_, H>, lake: &Lake, chunk: &WaterChunk, detail: f32, flat: bool) -> ChunkLayout {
    let (cell_min_x, cell_max_x) = chunk_borders(chunk.min_x, chunk.max_x, lake.min_x, lake.max_x, detail);
    let (cell_min_y, cell_max_y) = chunk_borders(chunk.min_y, chunk.max_y, lake.min_y, lake.max_y, detail);
    let border_left = usize::from(cell_min_x < chunk.min_x as f32);
    let border_top = usize::from(cell_min_y < chunk.min_y as f32);
    let corners = |min: i32, max: i32| (((max - min) as f32 / detail) + 1.0).ceil() as usize;
    ChunkLayout {
        detail,
        flat,
        use_derivations: !flat && ctx.settings.derived_wave_normals,
        border_left,
        border_top,
        cell_min_x,
        cell_min_y,
        cell_max_x,
        cell_max_y,
        cells_w: ((cell_max_x - cell_min_x) / detail).ceil() as usize,
        cells_h: ((cell_max_y - cell_min_y) / detail).ceil() as usize,
        corners_w: corners(chunk.min_x, chunk.max_x),
        corners_h: corners(chunk.min_y, chunk.max_y),
    }
}

fn render_chunk<H: GroundHeight>(ctx: &FrameContext<'_, H>, lake: &Lake, chunk: &mut WaterChunk, detail: f32) -> ChunkDraw {
    let flat = lake.surface == SurfaceType::Flat || !ctx.waves.enabled;
    let const_alpha = chunk_const_alpha(ctx, lake, chunk, flat);
    let single_quad = flat && const_alpha.is_some() && !ctx.settings.reflections;
    let detail = if single_quad { SINGLE_QUAD_DETAIL } else { detail };
    let layout = chunk_layout(ctx, lake, chunk, detail, flat);

    if chunk.last_detail != Some(detail) {
        chunk.geometry.allocate_corners(layout.corners_w, layout.corners_h);
        if !flat && !layout.use_derivations {
            chunk.geometry.allocate_cells(layout.cells_w, layout.cells_h);
        }
        chunk.last_detail = Some(detail);
        chunk.dirty = true;
    }

    if chunk.dirty {
        if !flat && !layout.use_derivations {
            compute_cells(ctx, lake, chunk, &layout);
        }
        compute_corners(ctx, lake, chunk, &layout);
        compute_indices(ctx, lake, chunk, &layout);
        chunk.dirty = false;
    }

    ChunkDraw {
        lake: 0,
        chunk: 0,
        flat,
        const_alpha,
        use_derivations: layout.use_derivations,
        single_quad,
        bumpmapping: ctx.settings.bumpmapping,
        reflections: ctx.settings.reflections,
        blended: ctx.settings.translucency && const_alpha != Some(1.0),
        texture_offset: ctx.texture_offset,
        quads: chunk.geometry.quad_count(),
    }
}

/// Project `v` into the tangent frame `(s, t, n)`.
fn to_tangent_space(v: Vec3, s: Vec3, t: Vec3, n: Vec3) -> Vec3 {
    Vec3::new(s.dot(v), t.dot(v), n.dot(v))
}

/// Face normal, tangent light and half vector of every cell in the
/// bordered cell range.
fn compute_cells<H: GroundHeight>(ctx: &FrameContext<'_, H>, lake: &Lake, chunk: &mut WaterChunk, layout: &ChunkLayout) {
    let detail = layout.detail;
    let geometry = &mut chunk.geometry;

    let mut x = layout.cell_min_x;
    let mut xi = 0;
    while x < layout.cell_max_x && xi < layout.cells_w {
        let x2 = (x + detail).min(layout.cell_max_x);
        let mut y = layout.cell_min_y;
        let mut yi = 0;
        while y < layout.cell_max_y && yi < layout.cells_h {
            let y2 = (y + detail).min(layout.cell_max_y);
            let index = geometry.cell(xi, yi);
            if !lake.has_any_corner(x, y, x + detail, y + detail) {
                geometry.cell_normals[index] = Vec3::ZERO;
                geometry.cell_tangent_lights[index] = Vec3::ZERO;
                geometry.cell_half_vectors[index] = Vec3::ZERO;
            } else {
                let a = Vec3::new(x, y, lake.height(x, y, ctx.heights, ctx.waves));
                let b = Vec3::new(x2, y, lake.height(x2, y, ctx.heights, ctx.waves));
                let c = Vec3::new(x, y2, lake.height(x, y2, ctx.heights, ctx.waves));
                let normal = (c - b).cross(a - b).normalize_or(Vec3::Z);

                let mut s = ((b - a) * ((x2 - x) / ctx.texture_repeat)).normalize_or(Vec3::X);
                let mut t = ((a - c) * ((y2 - y) / ctx.texture_repeat)).normalize_or(Vec3::Y);
                if s.cross(t).dot(normal) < 0.0 {
                    s = -s;
                    t = -t;
                }

                let view = (ctx.camera - a).normalize_or(Vec3::Z);
                let half = (view + ctx.light).normalize_or(Vec3::Z);
                geometry.cell_normals[index] = normal;
                geometry.cell_tangent_lights[index] =
                    to_tangent_space(ctx.light, s, t, normal).normalize_or(Vec3::Z);
                geometry.cell_half_vectors[index] = to_tangent_space(half, s, t, normal).normalize_or(Vec3::Z);
            }
            y += detail;
            yi += 1;
        }
        x += detail;
        xi += 1;
    }
}

/// Sum the cell vectors around corner `(x, y)` of the chunk.
fn average_cells(geometry: &ChunkGeometry, layout: &ChunkLayout, x: usize, y: usize) -> (Vec3, Vec3, Vec3) {
    let cell_x = x + layout.border_left;
    let cell_y = y + layout.border_top;
    let mut around = Vec::with_capacity(4);
    if cell_x > 0 && cell_y > 0 {
        around.push((cell_x - 1, cell_y - 1));
    }
    if cell_x < layout.cells_w && cell_y > 0 {
        around.push((cell_x, cell_y - 1));
    }
    if cell_x < layout.cells_w && cell_y < layout.cells_h {
        around.push((cell_x, cell_y));
    }
    if cell_x > 0 && cell_y < layout.cells_h {
        around.push((cell_x - 1, cell_y));
    }

    let mut normal = Vec3::ZERO;
    let mut light = Vec3::ZERO;
    let mut half = Vec3::ZERO;
    for (cx, cy) in around {
        let index = geometry.cell(cx, cy);
        normal += geometry.cell_normals[index];
        light += geometry.cell_tangent_lights[index];
        half += geometry.cell_half_vectors[index];
    }
    (normal, light, half)
}

/// Vertex, normal, lighting vectors and color of every chunk corner.
fn compute_corners<H: GroundHeight>(ctx: &FrameContext<'_, H>, lake: &Lake, chunk: &mut WaterChunk, layout: &ChunkLayout) {
    let detail = layout.detail;
    let wave_vector = lake.appearance.wave_vector;
    let (min_x, min_y) = (chunk.min_x as f32, chunk.min_y as f32);
    let (max_x, max_y) = (chunk.max_x as f32, chunk.max_y as f32);

    for y in 0..layout.corners_h {
        let pos_y = (min_y + y as f32 * detail).min(max_y);
        for x in 0..layout.corners_w {
            let pos_x = (min_x + x as f32 * detail).min(max_x);
            let index = chunk.geometry.corner(x, y);

            if !lake.has_any_corner(pos_x - detail, pos_y - detail, pos_x + detail, pos_y + detail) {
                let geometry = &mut chunk.geometry;
                geometry.vertices[index] = Vec3::new(pos_x, -pos_y, HIDDEN_VERTEX_Z);
                geometry.normals[index] = Vec3::Z;
                geometry.tangent_lights_alpha[index] = Vec4::new(0.0, 0.0, 1.0, 0.0);
                geometry.tangent_lights[index] = Vec3::Z;
                geometry.half_vectors[index] = Vec3::Z;
                geometry.colors[index] = Vec4::ONE;
                continue;
            }

            let pos_z = lake.height(pos_x, pos_y, ctx.heights, ctx.waves);
            let position = Vec3::new(pos_x, pos_y, pos_z);
            let view = (ctx.camera - position).normalize_or(Vec3::Z);

            let (normal, light, half) = if layout.flat {
                (Vec3::Z, ctx.light, view + ctx.light)
            } else if layout.use_derivations {
                let d = lake.wave_derivative(pos_x, pos_y, ctx.heights, ctx.waves.time);
                let n = Vec3::new(-d * wave_vector.x, -d * wave_vector.y, 1.0).normalize_or(Vec3::Z);
                let s = if n.x == 0.0 { Vec3::X } else { Vec3::new(1.0, 0.0, -n.x / n.z).normalize() };
                let t = if n.y == 0.0 { Vec3::Y } else { Vec3::new(0.0, 1.0, -n.y / n.z).normalize() };
                let half = view + ctx.light;
                (n, to_tangent_space(ctx.light, s, t, n), to_tangent_space(half, s, t, n))
            } else {
                let (mut n, light, half) = average_cells(&chunk.geometry, layout, x, y);
                if n.length_squared() < MIN_NORMAL_LENGTH_SQ {
                    warn!("degenerate water normal at ({}, {})", pos_x, pos_y);
                    n = Vec3::Z;
                }
                (n.normalize(), light, half)
            };

            let alpha = lake.alpha_at(pos_x, pos_y, ctx.heights, ctx.waves);
            let light = light.normalize_or(Vec3::Z) * 0.5 + Vec3::splat(0.5);
            let half = half.normalize_or(Vec3::Z) * 0.5 + Vec3::splat(0.5);

            let geometry = &mut chunk.geometry;
            geometry.vertices[index] = Vec3::new(pos_x, -pos_y, pos_z);
            geometry.normals[index] = normal;
            geometry.tangent_lights[index] = light;
            geometry.tangent_lights_alpha[index] = light.extend(alpha);
            geometry.half_vectors[index] = half;
            geometry.colors[index] = Vec4::new(1.0, 1.0, 1.0, alpha);
        }
    }
}

/// Emit a quad for every chunk cell that touches the lake.
fn compute_indices<H: GroundHeight>(ctx: &FrameContext<'_, H>, lake: &Lake, chunk: &mut WaterChunk, layout: &ChunkLayout) {
    let detail = layout.detail;
    let w = layout.corners_w;
    let corner = |x: usize, y: usize| (y * w + x) as u32;
    let steps = |min: i32, max: i32| ((max - min) as f32 / detail).ceil().max(0.0) as usize;

    let geometry = &mut chunk.geometry;
    geometry.indices.clear();
    for xi in 0..steps(chunk.min_x, chunk.max_x) {
        let x = chunk.min_x as f32 + xi as f32 * detail;
        for yi in 0..steps(chunk.min_y, chunk.max_y) {
            let y = chunk.min_y as f32 + yi as f32 * detail;
            if xi + 1 >= layout.corners_w || yi + 1 >= layout.corners_h {
                error!("water quad ({}, {}) outside chunk corners {}x{}", xi, yi, layout.corners_w, layout.corners_h);
                continue;
            }

            let (pos_x, pos_y) = (x as i32, y as i32);
            if ctx.settings.reflections {
                if let Some(fog) = ctx.fog {
                    if fog.is_fogged(pos_x, pos_y).unwrap_or(false) {
                        continue;
                    }
                }
            }
            let pos_x2 = ((x + detail) as i32).min(chunk.max_x);
            let pos_y2 = ((y + detail) as i32).min(chunk.max_y);
            if !lake.has_any_corner(pos_x as f32, pos_y as f32, pos_x2 as f32, pos_y2 as f32) {
                continue;
            }

            geometry.indices.extend_from_slice(&[
                corner(xi, yi),
                corner(xi + 1, yi),
                corner(xi + 1, yi + 1),
                corner(xi, yi + 1),
            ]);
        }
    }
}
