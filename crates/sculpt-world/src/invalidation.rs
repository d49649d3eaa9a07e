//! Neighbor invalidation: which chunk meshes read a given voxel.
//!
//! The mesh for chunk `c` covers the central window of the neighborhood
//! `c - 1 ..= c`, that is local voxels `[half, size)` of `c - 1` and
//! `[0, half)` of `c` on every axis, with `half` from [`half_chunk`]. A voxel therefore feeds chunk `c + n`
//! (`n ∈ {0, 1}`) when its local coordinate falls in
//! `[n * half - 1, (n + 1) * half]`: the window plus the one-voxel margin
//! read for face culling.

use rustc_hash::FxHashSet;
use sculpt_voxel::{ChunkCoord, half_chunk};

/// Determines which chunk meshes go stale after a voxel edit.
pub struct MeshInvalidator;

impl MeshInvalidator {
    /// Returns every chunk whose mesh reads the voxel at `local` in `chunk`.
    ///
    /// Coordinates come out with x varying fastest, then y, then z. At most
    /// eight are returned.
    pub fn invalidate(
        chunk: ChunkCoord,
        local: [usize; 3],
        chunk_size: usize,
    ) -> Vec<ChunkCoord> {
        let [x, y, z] = local;
        let mut dirty = Vec::with_capacity(8);
        for nz in 0..2 {
            for ny in 0..2 {
                for nx in 0..2 {
                    if feeds(x, nx, chunk_size)
                        && feeds(y, ny, chunk_size)
                        && feeds(z, nz, chunk_size)
                    {
                        dirty.push(chunk.offset(nx as i32, ny as i32, nz as i32));
                    }
                }
            }
        }
        dirty
    }
}

/// Tests `local ∈ [n * half - 1, (n + 1) * half]`.
fn feeds(local: usize, n: usize, chunk_size: usize) -> bool {
    let half = half_chunk(chunk_size);
    local + 1 >= n * half && local <= (n + 1) * half
}

/// Insertion-ordered set of chunk coordinates.
#[derive(Clone, Debug, Default)]
pub struct ChunkSet {
    order: Vec<ChunkCoord>,
    members: FxHashSet<ChunkCoord>,
}

impl ChunkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `coord`; returns `false` if it was already present.
    pub fn insert(&mut self, coord: ChunkCoord) -> bool {
        if !self.members.insert(coord) {
            return false;
        }
        self.order.push(coord);
        true
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.members.contains(&coord)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.order.iter().copied()
    }

    /// Removes and returns every member in insertion order.
    pub fn take(&mut self) -> Vec<ChunkCoord> {
        self.members.clear();
        std::mem::take(&mut self.order)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}
