use bevy::prelude::*;

/// Cached render data of a chunk. Corner arrays are row-major with
/// `corners_w` entries per row; cell arrays likewise with `cells_w`.
#[derive(Debug, Clone, Default)]
pub struct ChunkGeometry {
    pub corners_w: usize,
    pub corners_h: usize,
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// Tangent-space light vector remapped to `[0, 1]`.
    pub tangent_lights: Vec<Vec3>,
    /// As `tangent_lights`, with the water alpha in `w`.
    pub tangent_lights_alpha: Vec<Vec4>,
    /// Tangent-space half-angle vector remapped to `[0, 1]`.
    pub half_vectors: Vec<Vec3>,
    pub colors: Vec<Vec4>,
    /// Quads, four indices each.
    pub indices: Vec<u32>,
    pub(crate) cells_w: usize,
    pub(crate) cells_h: usize,
    pub(crate) cell_normals: Vec<Vec3>,
    pub(crate) cell_tangent_lights: Vec<Vec3>,
    pub(crate) cell_half_vectors: Vec<Vec3>,
}

impl ChunkGeometry {
    pub fn quad_count(&self) -> usize {
        self.indices.len() / 4
    }

    pub fn corner(&self, x: usize, y: usize) -> usize {
        y * self.corners_w + x
    }

    pub(crate) fn cell(&self, x: usize, y: usize) -> usize {
        y * self.cells_w + x
    }

    /// Resize corner arrays for a new tessellation.
    pub(crate) fn allocate_corners(&mut self, corners_w: usize, corners_h: usize) {
        let corners = corners_w * corners_h;
        self.corners_w = corners_w;
        self.corners_h = corners_h;
        self.vertices = vec![Vec3::ZERO; corners];
        self.normals = vec![Vec3::Z; corners];
        self.tangent_lights = vec![Vec3::ZERO; corners];
        self.tangent_lights_alpha = vec![Vec4::ZERO; corners];
        self.half_vectors = vec![Vec3::ZERO; corners];
        self.colors = vec![Vec4::ONE; corners];
        self.indices = Vec::with_capacity(corners_w.saturating_sub(1) * corners_h.saturating_sub(1) * 4);
    }

    pub(crate) fn allocate_cells(&mut self, cells_w: usize, cells_h: usize) {
        let cells = cells_w * cells_h;
        self.cells_w = cells_w;
        self.cells_h = cells_h;
        self.cell_normals = vec![Vec3::ZERO; cells];
        self.cell_tangent_lights = vec![Vec3::ZERO; cells];
        self.cell_half_vectors = vec![Vec3::ZERO; cells];
    }
}

/// Rectangular piece of a lake, at most `chunk_size` corners on a side.
#[derive(Debug, Clone)]
pub struct WaterChunk {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
    pub corner_count: usize,
    pub min_ground: f32,
    pub max_ground: f32,
    pub center: Vec3,
    pub dirty: bool,
    /// Detail the cached geometry was built for; `None` when nothing is cached.
    pub last_detail: Option<f32>,
    pub geometry: ChunkGeometry,
}

impl WaterChunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        min_x: i32,
        min_y: i32,
        max_x: i32,
        max_y: i32,
        corner_count: usize,
        min_ground: f32,
        max_ground: f32,
        level: f32,
    ) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            corner_count,
            min_ground,
            max_ground,
            center: Vec3::new(
                (min_x + max_x) as f32 / 2.0,
                -((min_y + max_y) as f32) / 2.0,
                level,
            ),
            dirty: true,
            last_detail: None,
            geometry: ChunkGeometry::default(),
        }
    }

    /// Drop cached buffers so the next render rebuilds them from scratch.
    pub fn free_geometry(&mut self) {
        self.geometry = ChunkGeometry::default();
        self.last_detail = None;
        self.dirty = true;
    }
}
