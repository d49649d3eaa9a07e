//! The meshing kernel contract.
//!
//! A kernel sees one chunk neighborhood: eight `chunk_size³` word buffers
//! concatenated in [`sculpt_voxel::neighborhood`] order (x fastest, then y,
//! then z). It writes into a per-unit [`KernelOutput`] that the pool reuses
//! between jobs; the pool copies the used prefix out into a fresh
//! [`Geometry`].

use crate::geometry::{Geometry, INSTANCE_STRIDE, VERTEX_STRIDE};

/// Errors raised while preparing a kernel on an execution unit.
#[derive(Debug, thiserror::Error)]
pub enum MeshKernelError {
    /// The kernel could not be loaded or instantiated.
    #[error("mesh kernel failed to initialize: {0}")]
    Init(String),
    /// The kernel does not support the requested chunk size.
    #[error("unsupported chunk size {0}")]
    UnsupportedChunkSize(usize),
}

/// Converts a voxel neighborhood into triangle and voxel-instance streams.
///
/// Implementations are shared by every execution unit, so they must be
/// `Send + Sync`. Per-job scratch belongs in the call, not in `self`.
pub trait MeshKernel: Send + Sync + 'static {
    /// Prepares the kernel on an execution unit before it accepts work.
    ///
    /// A failure leaves that unit permanently unavailable.
    fn init(&self, chunk_size: usize) -> Result<(), MeshKernelError> {
        let _ = chunk_size;
        Ok(())
    }

    /// Meshes one neighborhood of `8 * chunk_size³` words into `out`.
    ///
    /// `out` has been cleared. A triangle count of zero means "no geometry".
    fn run(&self, chunks: &[u32], chunk_size: usize, out: &mut KernelOutput);
}

/// Reusable kernel output region owned by one execution unit.
#[derive(Debug, Default)]
pub struct KernelOutput {
    /// Number of triangles written to `vertices`.
    pub triangles: usize,
    /// Number of instances written to `voxels`.
    pub instances: usize,
    /// Interleaved triangle vertices, [`VERTEX_STRIDE`] floats each.
    pub vertices: Vec<f32>,
    /// Interleaved voxel instances, [`INSTANCE_STRIDE`] floats each.
    pub voxels: Vec<f32>,
    /// Local-space bounds `[min_x, min_y, min_z, max_x, max_y, max_z]`.
    pub bounds: [f32; 6],
}

impl KernelOutput {
    /// Creates an empty output region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets counts and streams, keeping allocations.
    pub fn clear(&mut self) {
        self.triangles = 0;
        self.instances = 0;
        self.vertices.clear();
        self.voxels.clear();
        self.bounds = [0.0; 6];
    }

    /// Copies the used prefix into freshly owned geometry.
    ///
    /// Returns `None` when the kernel reported zero triangles.
    pub fn to_geometry(&self) -> Option<Geometry> {
        if self.triangles == 0 {
            return None;
        }
        let vertex_len = (self.triangles * 3 * VERTEX_STRIDE).min(self.vertices.len());
        let voxel_len = (self.instances * INSTANCE_STRIDE).min(self.voxels.len());
        Some(Geometry {
            bounds: self.bounds,
            vertices: self.vertices[..vertex_len].to_vec(),
            voxels: self.voxels[..voxel_len].to_vec(),
        })
    }
}
