//! Renderable chunk geometry as produced by a mesh kernel.

use glam::Vec3;

/// Floats per triangle vertex: position (3), normal (3), colour (3).
pub const VERTEX_STRIDE: usize = 9;

/// Floats per voxel instance: offset (3), colour (3).
pub const INSTANCE_STRIDE: usize = 6;

/// Geometry for one chunk, in chunk-local space.
///
/// Ownership moves from the worker pool to the chunk entity that displays it.
/// "No geometry" is represented by `Option::<Geometry>::None`, never by an
/// empty value of this type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    /// Axis-aligned bounds: `[min_x, min_y, min_z, max_x, max_y, max_z]`.
    pub bounds: [f32; 6],
    /// Interleaved triangle list, [`VERTEX_STRIDE`] floats per vertex.
    pub vertices: Vec<f32>,
    /// Interleaved single-voxel instances, [`INSTANCE_STRIDE`] floats each.
    pub voxels: Vec<f32>,
}

impl Geometry {
    /// Number of triangles in the vertex stream.
    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / (VERTEX_STRIDE * 3)
    }

    /// Number of voxel instances.
    pub fn instance_count(&self) -> usize {
        self.voxels.len() / INSTANCE_STRIDE
    }

    /// Minimum corner of the bounds.
    pub fn min(&self) -> Vec3 {
        Vec3::new(self.bounds[0], self.bounds[1], self.bounds[2])
    }

    /// Maximum corner of the bounds.
    pub fn max(&self) -> Vec3 {
        Vec3::new(self.bounds[3], self.bounds[4], self.bounds[5])
    }

    /// Bounding sphere `(center, radius)` enclosing the bounds.
    pub fn bounding_sphere(&self) -> (Vec3, f32) {
        let (min, max) = (self.min(), self.max());
        let center = (min + max) * 0.5;
        (center, (max - center).length())
    }
}
