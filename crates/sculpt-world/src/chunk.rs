//! Chunk entity: the displayed mesh for one chunk coordinate.

use glam::Vec3;
use sculpt_mesh::Geometry;
use sculpt_voxel::{ChunkCoord, chunk_origin};

/// Displayed state of one chunk, fed by the world's meshing loop.
///
/// `update` performs no gating of its own. The world decides which results
/// reach it by comparing `request` and `version`.
#[derive(Clone, Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    position: Vec3,
    /// Number of mesh dispatches issued for this chunk.
    pub(crate) request: u64,
    /// Request number of the last applied result.
    pub(crate) version: u64,
    geometry: Option<Geometry>,
    visible: bool,
}

impl Chunk {
    /// Creates an invisible, empty chunk placed at `coord * size - size / 2`.
    pub fn new(coord: ChunkCoord, chunk_size: usize) -> Self {
        Self {
            coord,
            position: chunk_origin(coord, chunk_size),
            request: 0,
            version: 0,
            geometry: None,
            visible: false,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// World-space placement of the chunk's local origin.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn request(&self) -> u64 {
        self.request
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Replaces the displayed content. `None` hides the chunk.
    pub fn update(&mut self, geometry: Option<Geometry>) {
        self.visible = geometry.is_some();
        self.geometry = geometry;
    }

    /// Releases the displayed geometry.
    pub fn dispose(&mut self) {
        self.geometry = None;
        self.visible = false;
    }

    /// Issues the next request number.
    pub(crate) fn next_request(&mut self) -> u64 {
        self.request += 1;
        self.request
    }
}
