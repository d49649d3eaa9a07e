//! Chunk coordinates and the mapping between world voxels and chunk-local cells.

use glam::Vec3;

/// Number of chunks in a meshing neighborhood (2×2×2).
pub const NEIGHBORHOOD_LEN: usize = 8;

/// Identifies a chunk in the lattice.
///
/// A chunk at `(x, y, z)` holds the world voxels
/// `[x * size, (x + 1) * size)` on each axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// Chunk-grid X coordinate.
    pub x: i32,
    /// Chunk-grid Y coordinate.
    pub y: i32,
    /// Chunk-grid Z coordinate.
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the coordinate offset by `(dx, dy, dz)`.
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.x, self.y, self.z)
    }
}

/// Splits a world voxel position into its chunk and chunk-local cell.
///
/// Uses floor division, so `-1` lands in chunk `-1` at local `size - 1`.
pub fn split_world(x: i32, y: i32, z: i32, chunk_size: usize) -> (ChunkCoord, [usize; 3]) {
    let cs = chunk_size as i32;
    let coord = ChunkCoord::new(x.div_euclid(cs), y.div_euclid(cs), z.div_euclid(cs));
    let local = [
        x.rem_euclid(cs) as usize,
        y.rem_euclid(cs) as usize,
        z.rem_euclid(cs) as usize,
    ];
    (coord, local)
}

/// Linear index of a chunk-local cell, x varying fastest.
#[inline]
pub fn voxel_index([x, y, z]: [usize; 3], chunk_size: usize) -> usize {
    (z * chunk_size + y) * chunk_size + x
}

/// The eight chunks a mesh for `coord` reads, in kernel order.
///
/// Covers `(x-1..=x, y-1..=y, z-1..=z)` with x varying fastest, then y,
/// then z.
pub fn neighborhood(coord: ChunkCoord) -> [ChunkCoord; NEIGHBORHOOD_LEN] {
    let mut out = [coord; NEIGHBORHOOD_LEN];
    let mut i = 0;
    for dz in -1..=0 {
        for dy in -1..=0 {
            for dx in -1..=0 {
                out[i] = coord.offset(dx, dy, dz);
                i += 1;
            }
        }
    }
    out
}

/// Offset of the mesh window inside a neighborhood, in voxels per axis.
///
/// Meshing, entity placement and dirty marking all derive from this one
/// integer so odd chunk sizes stay aligned.
pub const fn half_chunk(chunk_size: usize) -> usize {
    chunk_size / 2
}

/// World-space origin of the chunk entity meshed for `coord`.
///
/// The window starts `half_chunk` voxels into chunk `coord - 1`, that is at
/// `coord * size - (size - half_chunk(size))`.
pub fn chunk_origin(coord: ChunkCoord, chunk_size: usize) -> Vec3 {
    let cs = chunk_size as f32;
    let shift = (chunk_size - half_chunk(chunk_size)) as f32;
    Vec3::new(
        coord.x as f32 * cs - shift,
        coord.y as f32 * cs - shift,
        coord.z as f32 * cs - shift,
    )
}
